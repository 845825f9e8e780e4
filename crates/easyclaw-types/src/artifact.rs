use crate::RuleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Artifact ID type
pub type ArtifactId = String;

/// Unknown discriminator read back from storage or a strategy reply
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {what}: '{value}'")]
pub struct ParseEnumError {
    pub what: &'static str,
    pub value: String,
}

/// What a rule compiles into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Behavioral text injected into the agent's policy view
    PolicyFragment,
    /// Hard block enforced by the runtime
    Guard,
    /// Installable skill materialized as a SKILL.md file
    ActionBundle,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::PolicyFragment => "policy-fragment",
            ArtifactKind::Guard => "guard",
            ArtifactKind::ActionBundle => "action-bundle",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "policy-fragment" | "policy" => Ok(ArtifactKind::PolicyFragment),
            "guard" => Ok(ArtifactKind::Guard),
            "action-bundle" | "skill" => Ok(ArtifactKind::ActionBundle),
            _ => Err(ParseEnumError {
                what: "artifact kind",
                value: s.to_string(),
            }),
        }
    }
}

/// Lifecycle status of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Ok,
    Failed,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Ok => "ok",
            ArtifactStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(ArtifactStatus::Ok),
            "failed" => Ok(ArtifactStatus::Failed),
            _ => Err(ParseEnumError {
                what: "artifact status",
                value: s.to_string(),
            }),
        }
    }
}

/// Persisted compiled output of a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub rule_id: RuleId,
    pub kind: ArtifactKind,
    pub content: String,
    pub status: ArtifactStatus,
    /// Location of the materialized SKILL.md, only for action bundles
    pub output_path: Option<PathBuf>,
    pub compiled_at: DateTime<Utc>,
}

impl Artifact {
    /// Create a fresh, successfully compiled artifact with a new id
    pub fn new(rule_id: impl Into<RuleId>, kind: ArtifactKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            rule_id: rule_id.into(),
            kind,
            content: content.into(),
            status: ArtifactStatus::Ok,
            output_path: None,
            compiled_at: Utc::now(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ArtifactStatus::Ok
    }

    /// True while the artifact must have a SKILL.md on disk
    pub fn is_materializable(&self) -> bool {
        self.kind == ArtifactKind::ActionBundle && self.is_ok()
    }

    /// Typed view of a guard's JSON content
    pub fn guard_payload(&self) -> Option<GuardPayload> {
        match self.kind {
            ArtifactKind::Guard => serde_json::from_str(&self.content).ok(),
            ArtifactKind::PolicyFragment | ArtifactKind::ActionBundle => None,
        }
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: &ArtifactUpdate) {
        if let Some(kind) = update.kind {
            self.kind = kind;
        }
        if let Some(content) = &update.content {
            self.content = content.clone();
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(output_path) = &update.output_path {
            self.output_path = output_path.clone();
        }
        if let Some(compiled_at) = update.compiled_at {
            self.compiled_at = compiled_at;
        }
    }
}

/// Partial update of an artifact row; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactUpdate {
    pub kind: Option<ArtifactKind>,
    pub content: Option<String>,
    pub status: Option<ArtifactStatus>,
    /// `Some(None)` clears the path
    pub output_path: Option<Option<PathBuf>>,
    pub compiled_at: Option<DateTime<Utc>>,
}

impl ArtifactUpdate {
    /// New successful compilation result
    pub fn compiled(kind: ArtifactKind, content: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            content: Some(content.into()),
            status: Some(ArtifactStatus::Ok),
            compiled_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn status(status: ArtifactStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn output_path(path: Option<PathBuf>) -> Self {
        Self {
            output_path: Some(path),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: ArtifactStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// JSON payload of a guard artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardPayload {
    pub kind: String,
    pub action: String,
    pub reason: String,
    pub condition: String,
}
