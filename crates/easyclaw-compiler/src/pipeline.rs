//! Rule-to-artifact pipeline
//!
//! Owns every write to the artifact store. Compilation never fails from the
//! caller's point of view: errors end up as a `Failed` artifact (when one
//! already existed) plus a [`PipelineEvent::Failed`].

use easyclaw_persistence::{ArtifactStore, RuleStore};
use easyclaw_types::{
    Artifact, ArtifactKind, ArtifactStatus, ArtifactUpdate, CompileOutput, PipelineEvent, Rule,
};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::compiler::{compile_for_rule, validate_output};
use crate::error::Result;
use crate::strategy::CompileStrategy;

/// Default size budget of the policy view
pub const DEFAULT_POLICY_VIEW_LENGTH: usize = 4000;

/// Default number of rules compiled concurrently by `recompile_all`
pub const DEFAULT_CONCURRENCY: usize = 4;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Outcome counts of a batch operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Handle returned by [`ArtifactPipeline::subscribe`]
///
/// Dropping the handle unsubscribes as well.
pub struct EventSubscription {
    receiver: broadcast::Receiver<PipelineEvent>,
}

impl EventSubscription {
    /// Wait for the next event; `None` once the pipeline is gone
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-published event, if any
    pub fn try_recv(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(_) => return None,
            }
        }
    }

    /// Stop receiving events
    pub fn unsubscribe(self) {}
}

/// Compiles rules into artifacts and keeps the artifact store current
pub struct ArtifactPipeline {
    artifacts: Arc<dyn ArtifactStore>,
    rules: Arc<dyn RuleStore>,
    strategy: Option<Arc<dyn CompileStrategy>>,
    concurrency: usize,
    events: broadcast::Sender<PipelineEvent>,
}

impl ArtifactPipeline {
    /// Create a pipeline using only the deterministic compiler
    pub fn new(artifacts: Arc<dyn ArtifactStore>, rules: Arc<dyn RuleStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            artifacts,
            rules,
            strategy: None,
            concurrency: DEFAULT_CONCURRENCY,
            events,
        }
    }

    /// Try `strategy` before the deterministic compiler
    pub fn with_strategy(mut self, strategy: Arc<dyn CompileStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Maximum rules compiled at once by `recompile_all`
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Subscribe to `compiled` / `failed` events
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.events.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Produce the output for a rule, preferring the strategy when configured
    async fn generate(&self, rule: &Rule) -> CompileOutput {
        let Some(strategy) = &self.strategy else {
            return compile_for_rule(&rule.id, &rule.text);
        };

        let attempt = strategy
            .compile(&rule.text)
            .await
            .and_then(|output| validate_output(&output).map(|()| output));

        match attempt {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    "Compile strategy '{}' failed, using deterministic compiler: {}",
                    strategy.name(),
                    e
                );
                compile_for_rule(&rule.id, &rule.text)
            }
        }
    }

    /// Compile a rule and upsert its artifact
    ///
    /// The artifact keeps its id across recompiles, even when its kind
    /// changes. On failure the previous artifact keeps its content and is
    /// returned with `status == Failed`; a rule that never compiled stays
    /// uncompiled and `None` is returned. Errors are never returned.
    pub async fn compile_rule(&self, rule: &Rule) -> Option<Artifact> {
        let output = self.generate(rule).await;

        let existing = match self.artifacts.get_by_rule_id(&rule.id).await {
            Ok(existing) => existing,
            Err(e) => {
                let error = format!("{:#}", e);
                warn!("Failed to look up artifact for rule {}: {}", rule.id, error);
                self.emit_failed(&rule.id, error);
                return None;
            }
        };

        match self.persist(rule, existing.as_ref(), output).await {
            Ok(artifact) => {
                debug!(
                    "Compiled rule {} into {} artifact {}",
                    rule.id, artifact.kind, artifact.id
                );
                self.emit(PipelineEvent::Compiled {
                    rule_id: rule.id.clone(),
                    artifact: artifact.clone(),
                });
                Some(artifact)
            }
            Err(e) => {
                let error = format!("{:#}", e);
                warn!("Failed to compile rule {}: {}", rule.id, error);
                match existing {
                    Some(previous) => Some(self.mark_failed(&previous, error, false).await),
                    None => {
                        self.emit_failed(&rule.id, error);
                        None
                    }
                }
            }
        }
    }

    async fn persist(
        &self,
        rule: &Rule,
        existing: Option<&Artifact>,
        output: CompileOutput,
    ) -> anyhow::Result<Artifact> {
        match existing {
            Some(previous) => {
                let update = ArtifactUpdate::compiled(output.kind, output.content);
                self.artifacts.update(&previous.id, &update).await
            }
            None => {
                let artifact = Artifact::new(rule.id.clone(), output.kind, output.content);
                self.artifacts.create(&artifact).await?;
                Ok(artifact)
            }
        }
    }

    fn emit_failed(&self, rule_id: &str, error: String) {
        self.emit(PipelineEvent::Failed {
            rule_id: rule_id.to_string(),
            error,
        });
    }

    /// Flag an artifact as `Failed` without touching its content and emit
    /// `failed`. Returns the artifact as it now stands.
    ///
    /// When clearing `output_path` cannot be stored, the status alone is
    /// still written.
    pub(crate) async fn mark_failed(
        &self,
        artifact: &Artifact,
        error: String,
        clear_output_path: bool,
    ) -> Artifact {
        let mut update = ArtifactUpdate::status(ArtifactStatus::Failed);
        if clear_output_path {
            update.output_path = Some(None);
        }

        let failed = match self.artifacts.update(&artifact.id, &update).await {
            Ok(stored) => stored,
            Err(e) if clear_output_path => {
                warn!(
                    "Failed to clear output path of artifact {}: {:#}",
                    artifact.id, e
                );
                let status_only = ArtifactUpdate::status(ArtifactStatus::Failed);
                match self.artifacts.update(&artifact.id, &status_only).await {
                    Ok(stored) => stored,
                    Err(e) => {
                        warn!("Failed to mark artifact {} as failed: {:#}", artifact.id, e);
                        let mut local = artifact.clone();
                        local.apply(&status_only);
                        local
                    }
                }
            }
            Err(e) => {
                warn!("Failed to mark artifact {} as failed: {:#}", artifact.id, e);
                let mut local = artifact.clone();
                local.apply(&update);
                local
            }
        };

        self.emit_failed(&artifact.rule_id, error);
        failed
    }

    /// Record where an artifact's skill file lives (or that it has none)
    pub(crate) async fn set_output_path(
        &self,
        artifact_id: &str,
        output_path: Option<PathBuf>,
    ) -> Result<Artifact> {
        Ok(self
            .artifacts
            .update(artifact_id, &ArtifactUpdate::output_path(output_path))
            .await?)
    }

    /// Recompile every known rule; one rule failing never stops the batch
    pub async fn recompile_all(&self) -> Result<BatchSummary> {
        let rules = self.rules.list_rules().await?;
        info!("Recompiling {} rules", rules.len());

        let summary = stream::iter(rules.iter())
            .map(|rule| self.compile_rule(rule))
            .buffer_unordered(self.concurrency)
            .fold(BatchSummary::default(), |mut summary, artifact| async move {
                match artifact {
                    Some(artifact) if artifact.is_ok() => summary.succeeded += 1,
                    _ => summary.failed += 1,
                }
                summary
            })
            .await;

        info!(
            "Recompile finished: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        Ok(summary)
    }

    /// Newline-joined content of every `Ok` policy fragment, in creation order
    ///
    /// Whole fragments only: the first fragment that would push the result
    /// past `max_length` bytes ends the view.
    pub async fn get_compiled_policy_view(&self, max_length: usize) -> Result<String> {
        let artifacts = self.artifacts.get_all().await?;

        let mut view = String::new();
        for artifact in artifacts
            .iter()
            .filter(|a| a.kind == ArtifactKind::PolicyFragment && a.is_ok())
        {
            let separator = if view.is_empty() { 0 } else { 1 };
            if view.len() + separator + artifact.content.len() > max_length {
                break;
            }
            if separator == 1 {
                view.push('\n');
            }
            view.push_str(&artifact.content);
        }

        Ok(view)
    }

    /// Every `Ok` guard artifact
    pub async fn get_active_guards(&self) -> Result<Vec<Artifact>> {
        let artifacts = self.artifacts.get_all().await?;
        Ok(artifacts
            .into_iter()
            .filter(|a| a.kind == ArtifactKind::Guard && a.is_ok())
            .collect())
    }

    /// Delete every artifact of a rule; a no-op when there is none
    pub async fn remove_artifacts(&self, rule_id: &str) -> Result<u64> {
        let removed = self.artifacts.delete_by_rule_id(rule_id).await?;
        if removed > 0 {
            info!("Removed {} artifact(s) for rule {}", removed, rule_id);
        }
        Ok(removed)
    }

    /// Current artifact of a rule
    pub async fn get_artifact(&self, rule_id: &str) -> Result<Option<Artifact>> {
        Ok(self.artifacts.get_by_rule_id(rule_id).await?)
    }

    /// Every artifact, in creation order
    pub async fn list_artifacts(&self) -> Result<Vec<Artifact>> {
        Ok(self.artifacts.get_all().await?)
    }

    /// Every rule known to the rule store, in creation order
    pub async fn list_rules(&self) -> Result<Vec<Rule>> {
        Ok(self.rules.list_rules().await?)
    }
}
