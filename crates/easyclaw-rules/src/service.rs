use crate::config::Config;
use anyhow::{bail, Context, Result};
use easyclaw_compiler::{
    ArtifactPipeline, ChatCompletionStrategy, EventSubscription, SkillLifecycleCoordinator,
};
use easyclaw_persistence::{PersistenceService, RuleStore};
use easyclaw_types::{Artifact, PipelineEvent, Rule};
use std::fs;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A single unit of work requested from the command line
#[derive(Debug, Clone)]
pub enum Command {
    Sync,
    Add { text: String },
    Edit { id: String, text: String },
    Remove { id: String },
    Policy { max_length: Option<usize> },
    Guards,
}

/// Rules service - wires storage, the compiler and the skills directory
pub struct RulesService {
    config: Config,
}

impl RulesService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run one command against the configured database and skills root
    pub async fn run(self, command: Command) -> Result<()> {
        easyclaw_logging::init_logging(&self.config.logging.level)?;
        info!("Starting EasyClaw rules service");

        let db_path = self.config.database_path();
        if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
        }
        let persistence = Arc::new(PersistenceService::new(&db_path.to_string_lossy()).await?);

        let mut pipeline = ArtifactPipeline::new(persistence.clone(), persistence.clone())
            .with_concurrency(self.config.compiler.concurrency);

        if let Some(enhanced) = self.config.enhanced() {
            let strategy = ChatCompletionStrategy::new(enhanced.to_chat_config())?;
            info!(
                "Enhanced compilation enabled: model={}, base_url={}",
                enhanced.model, enhanced.base_url
            );
            pipeline = pipeline.with_strategy(Arc::new(strategy));
        }

        let skills_root = self.config.skills_root();
        info!("Skills root: {}", skills_root.display());
        let coordinator = SkillLifecycleCoordinator::new(skills_root);

        let listener = spawn_event_logger(pipeline.subscribe());

        let outcome = self
            .execute(command, &persistence, &pipeline, &coordinator)
            .await;

        // Dropping the pipeline closes the channel so the logger drains and exits
        drop(pipeline);
        if let Err(e) = listener.await {
            warn!("Event logger stopped abnormally: {}", e);
        }

        outcome
    }

    async fn execute(
        &self,
        command: Command,
        persistence: &PersistenceService,
        pipeline: &ArtifactPipeline,
        coordinator: &SkillLifecycleCoordinator,
    ) -> Result<()> {
        match command {
            Command::Sync => {
                let summary = coordinator.sync_all(pipeline).await?;
                println!(
                    "Synced {} rule(s): {} succeeded, {} failed",
                    summary.succeeded + summary.failed,
                    summary.succeeded,
                    summary.failed
                );
            }
            Command::Add { text } => {
                let rule = Rule::new(text);
                persistence.save_rule(&rule).await?;
                println!("Added rule {}", rule.id);
                report(coordinator.sync_skills_for_rule(pipeline, &rule).await?);
            }
            Command::Edit { id, text } => {
                let Some(mut rule) = persistence.get_rule(&id).await? else {
                    bail!("Rule {} not found", id);
                };
                rule.edit(text);
                persistence.save_rule(&rule).await?;
                report(coordinator.sync_skills_for_rule(pipeline, &rule).await?);
            }
            Command::Remove { id } => {
                if persistence.get_rule(&id).await?.is_none() {
                    bail!("Rule {} not found", id);
                }
                let removed = coordinator.cleanup_skills_for_deleted_rule(pipeline, &id).await?;
                persistence.delete_rule(&id).await?;
                println!("Removed rule {} ({} skill file(s) deleted)", id, removed);
            }
            Command::Policy { max_length } => {
                let max_length = max_length.unwrap_or(self.config.compiler.max_policy_length);
                println!("{}", pipeline.get_compiled_policy_view(max_length).await?);
            }
            Command::Guards => {
                for guard in pipeline.get_active_guards().await? {
                    match guard.guard_payload() {
                        Some(payload) => println!(
                            "{}\t{}\t{}",
                            guard.rule_id, payload.action, payload.condition
                        ),
                        None => warn!("Guard for rule {} has unreadable content", guard.rule_id),
                    }
                }
            }
        }

        Ok(())
    }
}

fn report(artifact: Option<Artifact>) {
    match artifact {
        Some(a) if a.is_ok() => match &a.output_path {
            Some(path) => println!("Compiled {} -> {}", a.kind, path.display()),
            None => println!("Compiled {}", a.kind),
        },
        Some(a) => println!("Compile failed, keeping previous {}", a.kind),
        None => println!("Compile failed"),
    }
}

fn spawn_event_logger(mut events: EventSubscription) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                PipelineEvent::Compiled { rule_id, artifact } => {
                    info!("Rule {} compiled to {}", rule_id, artifact.kind)
                }
                PipelineEvent::Failed { rule_id, error } => {
                    warn!("Rule {} failed to compile: {}", rule_id, error)
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service() -> RulesService {
        let config: Config = toml::from_str(
            r#"
            [database]
            path = "unused.db"

            [skills]
            root = "unused"

            [compiler]

            [logging]
            level = "info"
            "#,
        )
        .unwrap();
        RulesService::new(config)
    }

    #[tokio::test]
    async fn test_remove_unknown_rule_touches_nothing() {
        let persistence = Arc::new(PersistenceService::in_memory().await.unwrap());
        let pipeline = ArtifactPipeline::new(persistence.clone(), persistence.clone());
        let root = TempDir::new().unwrap();
        let coordinator = SkillLifecycleCoordinator::new(root.path());

        // Artifact and skill file exist, but the rule itself was never saved
        let rule = Rule::new("Add a skill to summarize documents");
        let artifact = coordinator
            .sync_skills_for_rule(&pipeline, &rule)
            .await
            .unwrap()
            .unwrap();
        let path = artifact.output_path.unwrap();

        let result = service()
            .execute(
                Command::Remove {
                    id: rule.id.clone(),
                },
                &persistence,
                &pipeline,
                &coordinator,
            )
            .await;

        assert!(result.is_err());
        assert!(path.exists());
        assert!(pipeline.get_artifact(&rule.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_deletes_rule_artifacts_and_skill() {
        let persistence = Arc::new(PersistenceService::in_memory().await.unwrap());
        let pipeline = ArtifactPipeline::new(persistence.clone(), persistence.clone());
        let root = TempDir::new().unwrap();
        let coordinator = SkillLifecycleCoordinator::new(root.path());

        let rule = Rule::new("Add a skill to summarize documents");
        persistence.save_rule(&rule).await.unwrap();
        let artifact = coordinator
            .sync_skills_for_rule(&pipeline, &rule)
            .await
            .unwrap()
            .unwrap();
        let path = artifact.output_path.unwrap();

        service()
            .execute(
                Command::Remove {
                    id: rule.id.clone(),
                },
                &persistence,
                &pipeline,
                &coordinator,
            )
            .await
            .unwrap();

        assert!(!path.exists());
        assert!(persistence.get_rule(&rule.id).await.unwrap().is_none());
        assert!(pipeline.get_artifact(&rule.id).await.unwrap().is_none());
    }
}
