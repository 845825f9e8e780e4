use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use easyclaw_types::{Artifact, ArtifactUpdate, Rule};
use tokio::sync::RwLock;

use crate::{ArtifactStore, RuleStore};

/// In-process store keeping rules and artifacts in insertion order
#[derive(Default)]
pub struct MemoryStore {
    rules: RwLock<Vec<Rule>>,
    artifacts: RwLock<Vec<Artifact>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule, or replace the text of an existing one in place
    pub async fn save_rule(&self, rule: &Rule) {
        let mut rules = self.rules.write().await;
        match rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => {
                existing.text = rule.text.clone();
                existing.updated_at = rule.updated_at;
            }
            None => rules.push(rule.clone()),
        }
    }

    pub async fn delete_rule(&self, id: &str) -> bool {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|r| r.id != id);
        rules.len() != before
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn get_by_rule_id(&self, rule_id: &str) -> Result<Option<Artifact>> {
        let artifacts = self.artifacts.read().await;
        Ok(artifacts.iter().find(|a| a.rule_id == rule_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Artifact>> {
        Ok(self.artifacts.read().await.clone())
    }

    async fn create(&self, artifact: &Artifact) -> Result<()> {
        let mut artifacts = self.artifacts.write().await;
        if artifacts.iter().any(|a| a.rule_id == artifact.rule_id) {
            bail!("Rule {} already has an artifact", artifact.rule_id);
        }
        if artifacts.iter().any(|a| a.id == artifact.id) {
            bail!("Artifact {} already exists", artifact.id);
        }
        artifacts.push(artifact.clone());
        Ok(())
    }

    async fn update(&self, id: &str, update: &ArtifactUpdate) -> Result<Artifact> {
        let mut artifacts = self.artifacts.write().await;
        let artifact = artifacts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| anyhow!("Artifact {} not found", id))?;
        artifact.apply(update);
        Ok(artifact.clone())
    }

    async fn delete_by_rule_id(&self, rule_id: &str) -> Result<u64> {
        let mut artifacts = self.artifacts.write().await;
        let before = artifacts.len();
        artifacts.retain(|a| a.rule_id != rule_id);
        Ok((before - artifacts.len()) as u64)
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn list_rules(&self) -> Result<Vec<Rule>> {
        Ok(self.rules.read().await.clone())
    }

    async fn get_rule(&self, id: &str) -> Result<Option<Rule>> {
        let rules = self.rules.read().await;
        Ok(rules.iter().find(|r| r.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easyclaw_types::{ArtifactKind, ArtifactStatus};

    #[tokio::test]
    async fn test_create_rejects_second_artifact_for_rule() {
        let store = MemoryStore::new();
        let first = Artifact::new("rule-1", ArtifactKind::PolicyFragment, "[POLICY] a");
        let second = Artifact::new("rule-1", ArtifactKind::Guard, "{}");

        store.create(&first).await.unwrap();
        assert!(store.create(&second).await.is_err());
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_keeps_position() {
        let store = MemoryStore::new();
        let a = Artifact::new("rule-a", ArtifactKind::PolicyFragment, "[POLICY] a");
        let b = Artifact::new("rule-b", ArtifactKind::PolicyFragment, "[POLICY] b");
        store.create(&a).await.unwrap();
        store.create(&b).await.unwrap();

        let updated = store
            .update(&a.id, &ArtifactUpdate::status(ArtifactStatus::Failed))
            .await
            .unwrap();
        assert_eq!(updated.status, ArtifactStatus::Failed);

        let all = store.get_all().await.unwrap();
        assert_eq!(all[0].id, a.id);
        assert_eq!(all[1].id, b.id);
    }

    #[tokio::test]
    async fn test_delete_missing_rule_is_noop() {
        let store = MemoryStore::new();
        assert_eq!(store.delete_by_rule_id("nope").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_rule_updates_in_place() {
        let store = MemoryStore::new();
        let mut rule = Rule::new("first");
        store.save_rule(&rule).await;
        store.save_rule(&Rule::new("second")).await;

        rule.edit("first, edited");
        store.save_rule(&rule).await;

        let rules = store.list_rules().await.unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].text, "first, edited");
        assert!(store.delete_rule(&rule.id).await);
        assert!(!store.delete_rule(&rule.id).await);
    }
}
