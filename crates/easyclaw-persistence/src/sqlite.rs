use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use easyclaw_types::{Artifact, ArtifactUpdate, Rule};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::{ArtifactStore, RuleStore};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS rules (
        id TEXT PRIMARY KEY,
        text TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS artifacts (
        id TEXT PRIMARY KEY,
        rule_id TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL,
        content TEXT NOT NULL,
        status TEXT NOT NULL,
        output_path TEXT,
        compiled_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_artifacts_kind_status ON artifacts(kind, status)",
];

/// Persistence service for storing rules and artifacts in SQLite
pub struct PersistenceService {
    pool: SqlitePool,
}

impl PersistenceService {
    /// Create a new persistence service
    pub async fn new(database_path: &str) -> Result<Self> {
        let database_url = format!("sqlite:{}?mode=rwc", database_path);
        let pool = SqlitePool::connect(&database_url)
            .await
            .with_context(|| format!("Failed to open database {}", database_path))?;

        let service = Self { pool };
        service.run_migrations().await?;

        info!("Persistence service initialized with database: {}", database_path);
        Ok(service)
    }

    /// Private in-memory database; one connection so every query sees the same data
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let service = Self { pool };
        service.run_migrations().await?;
        Ok(service)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        info!("Database migrations completed");
        Ok(())
    }

    /// Insert a rule, or update its text if it already exists
    pub async fn save_rule(&self, rule: &Rule) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rules (id, text, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET text = excluded.text, updated_at = excluded.updated_at
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.text)
        .bind(rule.created_at.to_rfc3339())
        .bind(rule.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Saved rule {}", rule.id);
        Ok(())
    }

    /// Delete a rule; returns false if it did not exist
    pub async fn delete_rule(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM rules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_artifact(&self, id: &str) -> Result<Option<Artifact>> {
        let row = sqlx::query("SELECT * FROM artifacts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(artifact_from_row).transpose()
    }
}

#[async_trait]
impl ArtifactStore for PersistenceService {
    async fn get_by_rule_id(&self, rule_id: &str) -> Result<Option<Artifact>> {
        let row = sqlx::query("SELECT * FROM artifacts WHERE rule_id = ?")
            .bind(rule_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(artifact_from_row).transpose()
    }

    async fn get_all(&self) -> Result<Vec<Artifact>> {
        let rows = sqlx::query("SELECT * FROM artifacts ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(artifact_from_row).collect()
    }

    async fn create(&self, artifact: &Artifact) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO artifacts (id, rule_id, kind, content, status, output_path, compiled_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&artifact.id)
        .bind(&artifact.rule_id)
        .bind(artifact.kind.as_str())
        .bind(&artifact.content)
        .bind(artifact.status.as_str())
        .bind(path_to_text(artifact.output_path.as_ref()))
        .bind(artifact.compiled_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert artifact for rule {}", artifact.rule_id))?;

        Ok(())
    }

    async fn update(&self, id: &str, update: &ArtifactUpdate) -> Result<Artifact> {
        let mut artifact = self
            .get_artifact(id)
            .await?
            .ok_or_else(|| anyhow!("Artifact {} not found", id))?;
        artifact.apply(update);

        sqlx::query(
            r#"
            UPDATE artifacts
            SET kind = ?, content = ?, status = ?, output_path = ?, compiled_at = ?
            WHERE id = ?
            "#,
        )
        .bind(artifact.kind.as_str())
        .bind(&artifact.content)
        .bind(artifact.status.as_str())
        .bind(path_to_text(artifact.output_path.as_ref()))
        .bind(artifact.compiled_at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(artifact)
    }

    async fn delete_by_rule_id(&self, rule_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM artifacts WHERE rule_id = ?")
            .bind(rule_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RuleStore for PersistenceService {
    async fn list_rules(&self) -> Result<Vec<Rule>> {
        let rows = sqlx::query("SELECT * FROM rules ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(rule_from_row).collect()
    }

    async fn get_rule(&self, id: &str) -> Result<Option<Rule>> {
        let row = sqlx::query("SELECT * FROM rules WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(rule_from_row).transpose()
    }
}

fn path_to_text(path: Option<&PathBuf>) -> Option<String> {
    path.map(|p| p.to_string_lossy().into_owned())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp '{}'", value))?
        .with_timezone(&Utc))
}

fn artifact_from_row(row: &SqliteRow) -> Result<Artifact> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let output_path: Option<String> = row.try_get("output_path")?;
    let compiled_at: String = row.try_get("compiled_at")?;

    Ok(Artifact {
        id: row.try_get("id")?,
        rule_id: row.try_get("rule_id")?,
        kind: kind.parse()?,
        content: row.try_get("content")?,
        status: status.parse()?,
        output_path: output_path.map(PathBuf::from),
        compiled_at: parse_timestamp(&compiled_at)?,
    })
}

fn rule_from_row(row: &SqliteRow) -> Result<Rule> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Rule {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}
