//! Keeps skill files on disk in lockstep with action-bundle artifacts
//!
//! Each sync is staged: work out the target file, make sure no other rule
//! owns it, touch the filesystem, then persist `output_path`. A failure at
//! any stage leaves the artifact `Failed` so a retry redoes the whole
//! sequence.

use easyclaw_skills::{extract_skill_name, SkillError, SkillFileWriter};
use easyclaw_types::{Artifact, ArtifactKind, Rule};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::pipeline::{ArtifactPipeline, BatchSummary};

/// Materializes action-bundle artifacts as skills under one skills root
pub struct SkillLifecycleCoordinator {
    writer: SkillFileWriter,
}

impl SkillLifecycleCoordinator {
    pub fn new(skills_root: impl Into<PathBuf>) -> Self {
        Self::with_writer(SkillFileWriter::new(skills_root))
    }

    pub fn with_writer(writer: SkillFileWriter) -> Self {
        Self { writer }
    }

    pub fn skills_root(&self) -> &Path {
        self.writer.root()
    }

    /// Write an action bundle to `<root>/<name>/SKILL.md`
    ///
    /// Returns `None` for any other kind, the absolute path otherwise.
    pub fn materialize_skill(&self, artifact: &Artifact) -> std::result::Result<Option<PathBuf>, SkillError> {
        if artifact.kind != ArtifactKind::ActionBundle {
            return Ok(None);
        }

        let name = extract_skill_name(&artifact.content)?;
        self.writer.write(&name, &artifact.content).map(Some)
    }

    /// Delete an artifact's skill file, pruning its folder if left empty
    ///
    /// Returns `false` if there was no path or the file was already gone.
    pub fn dematerialize_skill(&self, artifact: &Artifact) -> std::result::Result<bool, SkillError> {
        match &artifact.output_path {
            Some(path) => self.writer.remove(path),
            None => Ok(false),
        }
    }

    /// Recompile a rule and bring its skill file in line with the result
    ///
    /// Returns the artifact as stored afterwards, or `None` if the rule has
    /// never compiled. A failed compile keeps the last-known-good file.
    pub async fn sync_skills_for_rule(
        &self,
        pipeline: &ArtifactPipeline,
        rule: &Rule,
    ) -> Result<Option<Artifact>> {
        let previous_path = pipeline
            .get_artifact(&rule.id)
            .await?
            .and_then(|artifact| artifact.output_path);

        let Some(artifact) = pipeline.compile_rule(rule).await else {
            return Ok(None);
        };
        if !artifact.is_ok() {
            return Ok(Some(artifact));
        }

        if artifact.kind != ArtifactKind::ActionBundle {
            return self.retire_skill(pipeline, artifact, previous_path).await.map(Some);
        }

        self.install_skill(pipeline, artifact, previous_path).await.map(Some)
    }

    /// Kind left `ActionBundle`: remove the old file and clear the path
    async fn retire_skill(
        &self,
        pipeline: &ArtifactPipeline,
        artifact: Artifact,
        previous_path: Option<PathBuf>,
    ) -> Result<Artifact> {
        let Some(path) = previous_path else {
            return Ok(artifact);
        };

        if let Err(e) = self.writer.remove(&path) {
            pipeline.mark_failed(&artifact, e.to_string(), false).await;
            return Err(e.into());
        }

        info!(
            "Rule {} is now a {}, removed skill {}",
            artifact.rule_id,
            artifact.kind,
            path.display()
        );
        match pipeline.set_output_path(&artifact.id, None).await {
            Ok(stored) => Ok(stored),
            Err(PipelineError::Persistence(e)) => {
                let error = format!("{:#}", e);
                pipeline.mark_failed(&artifact, error, true).await;
                Err(PipelineError::Persistence(e))
            }
            Err(e) => Err(e),
        }
    }

    async fn install_skill(
        &self,
        pipeline: &ArtifactPipeline,
        artifact: Artifact,
        previous_path: Option<PathBuf>,
    ) -> Result<Artifact> {
        let name = match extract_skill_name(&artifact.content) {
            Ok(name) => name,
            Err(e) => {
                pipeline.mark_failed(&artifact, e.to_string(), false).await;
                return Err(SkillError::from(e).into());
            }
        };
        let target = self.writer.skill_path(&name);

        let owner = match owner_of(pipeline, &artifact, &target).await {
            Ok(owner) => owner,
            Err(e) => {
                pipeline.mark_failed(&artifact, e.to_string(), false).await;
                return Err(e);
            }
        };
        if let Some(owner) = owner {
            let err = PipelineError::SkillPathTaken {
                path: target,
                owner,
            };
            pipeline.mark_failed(&artifact, err.to_string(), false).await;
            return Err(err);
        }

        let mut stale_removed = false;
        if let Some(stale) = previous_path.filter(|p| !same_file(p, &target)) {
            if let Err(e) = self.writer.remove(&stale) {
                pipeline.mark_failed(&artifact, e.to_string(), false).await;
                return Err(e.into());
            }
            info!("Skill for rule {} renamed, removed {}", artifact.rule_id, stale.display());
            stale_removed = true;
        }

        let path = match self.writer.write(&name, &artifact.content) {
            Ok(path) => path,
            Err(e) => {
                pipeline.mark_failed(&artifact, e.to_string(), stale_removed).await;
                return Err(e.into());
            }
        };

        match pipeline.set_output_path(&artifact.id, Some(path)).await {
            Ok(stored) => Ok(stored),
            Err(PipelineError::Persistence(e)) => {
                let error = format!("{:#}", e);
                pipeline.mark_failed(&artifact, error, false).await;
                Err(PipelineError::Persistence(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Remove every skill file and artifact row derived from a deleted rule
    ///
    /// Returns the number of skill files removed.
    pub async fn cleanup_skills_for_deleted_rule(
        &self,
        pipeline: &ArtifactPipeline,
        rule_id: &str,
    ) -> Result<usize> {
        let artifacts: Vec<Artifact> = pipeline
            .list_artifacts()
            .await?
            .into_iter()
            .filter(|a| a.rule_id == rule_id)
            .collect();

        let mut removed = 0;
        for artifact in &artifacts {
            if self.dematerialize_skill(artifact)? {
                removed += 1;
            }
        }

        pipeline.remove_artifacts(rule_id).await?;
        Ok(removed)
    }

    /// Sync every rule known to the pipeline
    pub async fn sync_all(&self, pipeline: &ArtifactPipeline) -> Result<BatchSummary> {
        let rules = pipeline.list_rules().await?;
        let mut summary = BatchSummary::default();

        for rule in &rules {
            match self.sync_skills_for_rule(pipeline, rule).await {
                Ok(Some(artifact)) if artifact.is_ok() => summary.succeeded += 1,
                Ok(_) => summary.failed += 1,
                Err(e) => {
                    warn!("Failed to sync skills for rule {}: {}", rule.id, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Skill sync finished: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        Ok(summary)
    }
}

/// Rule id of another artifact already recording `target` as its skill file
async fn owner_of(
    pipeline: &ArtifactPipeline,
    artifact: &Artifact,
    target: &Path,
) -> Result<Option<String>> {
    let owner = pipeline
        .list_artifacts()
        .await?
        .into_iter()
        .filter(|other| other.rule_id != artifact.rule_id)
        .find(|other| {
            other
                .output_path
                .as_deref()
                .is_some_and(|path| same_file(path, target))
        })
        .map(|other| other.rule_id);
    Ok(owner)
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
