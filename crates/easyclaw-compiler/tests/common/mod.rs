//! Shared fixtures for pipeline tests

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use easyclaw_compiler::ArtifactPipeline;
use easyclaw_persistence::{ArtifactStore, MemoryStore};
use easyclaw_types::{Artifact, ArtifactUpdate, PipelineEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::path::Path;
use std::sync::Arc;

/// Artifact store that fails selected writes on demand
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_compile_writes: AtomicBool,
    fail_path_writes: AtomicBool,
    fail_path_clears: AtomicBool,
}

impl FlakyStore {
    /// Fail creates and content updates, i.e. every compile write
    pub fn fail_compile_writes(&self, fail: bool) {
        self.fail_compile_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail updates that set `output_path`
    pub fn fail_path_writes(&self, fail: bool) {
        self.fail_path_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail updates that clear `output_path`
    pub fn fail_path_clears(&self, fail: bool) {
        self.fail_path_clears.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtifactStore for FlakyStore {
    async fn get_by_rule_id(&self, rule_id: &str) -> Result<Option<Artifact>> {
        self.inner.get_by_rule_id(rule_id).await
    }

    async fn get_all(&self) -> Result<Vec<Artifact>> {
        self.inner.get_all().await
    }

    async fn create(&self, artifact: &Artifact) -> Result<()> {
        if self.fail_compile_writes.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        self.inner.create(artifact).await
    }

    async fn update(&self, id: &str, update: &ArtifactUpdate) -> Result<Artifact> {
        if update.content.is_some() && self.fail_compile_writes.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        if matches!(update.output_path, Some(Some(_))) && self.fail_path_writes.load(Ordering::SeqCst)
        {
            bail!("database is locked");
        }
        if matches!(update.output_path, Some(None)) && self.fail_path_clears.load(Ordering::SeqCst) {
            bail!("database is locked");
        }
        self.inner.update(id, update).await
    }

    async fn delete_by_rule_id(&self, rule_id: &str) -> Result<u64> {
        self.inner.delete_by_rule_id(rule_id).await
    }
}

pub struct Fixture {
    pub rules: Arc<MemoryStore>,
    pub artifacts: Arc<FlakyStore>,
    pub pipeline: ArtifactPipeline,
}

pub fn fixture() -> Fixture {
    let rules = Arc::new(MemoryStore::new());
    let artifacts = Arc::new(FlakyStore::default());
    let pipeline = ArtifactPipeline::new(artifacts.clone(), rules.clone());
    Fixture {
        rules,
        artifacts,
        pipeline,
    }
}

/// Folder name of a materialized skill
pub fn skill_dir(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn drain(subscription: &mut easyclaw_compiler::EventSubscription) -> Vec<PipelineEvent> {
    std::iter::from_fn(|| subscription.try_recv()).collect()
}

pub fn failed_count(events: &[PipelineEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::Failed { .. }))
        .count()
}
