//! Storage for rules and their compiled artifacts
//!
//! The pipeline talks to storage through [`ArtifactStore`] and [`RuleStore`].
//! [`PersistenceService`] backs both with SQLite, [`MemoryStore`] keeps
//! everything in process.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::PersistenceService;

use anyhow::Result;
use async_trait::async_trait;
use easyclaw_types::{Artifact, ArtifactUpdate, Rule};

/// Storage of compiled artifacts. The pipeline is its only writer.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// The artifact compiled from `rule_id`, if any
    async fn get_by_rule_id(&self, rule_id: &str) -> Result<Option<Artifact>>;

    /// Every artifact, in creation order
    async fn get_all(&self) -> Result<Vec<Artifact>>;

    /// Insert a new artifact
    async fn create(&self, artifact: &Artifact) -> Result<()>;

    /// Patch an existing artifact and return the stored result
    async fn update(&self, id: &str, update: &ArtifactUpdate) -> Result<Artifact>;

    /// Delete every artifact of `rule_id`, returning how many rows went away
    async fn delete_by_rule_id(&self, rule_id: &str) -> Result<u64>;
}

/// Read access to user rules
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Every rule, in creation order
    async fn list_rules(&self) -> Result<Vec<Rule>>;

    async fn get_rule(&self, id: &str) -> Result<Option<Rule>>;
}
