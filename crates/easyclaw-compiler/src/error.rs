//! Error types for compilation and skill synchronization

use easyclaw_skills::SkillError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The enhanced compile strategy rejected or returned unusable output
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileStrategyError {
    /// Transport or HTTP-level failure
    #[error("Compile strategy request failed: {0}")]
    Request(String),

    /// No reply within the strategy's own deadline
    #[error("Compile strategy timed out after {0:?}")]
    Timeout(Duration),

    /// Reply could not be turned into a usable artifact
    #[error("Compile strategy returned malformed output: {0}")]
    Malformed(String),
}

/// Errors surfaced by the pipeline and the skill lifecycle
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Artifact or rule store failure
    #[error("Persistence error: {0:#}")]
    Persistence(anyhow::Error),

    /// Skill name extraction or filesystem failure during (de)materialization
    #[error(transparent)]
    Skill(#[from] SkillError),

    /// Another rule's artifact already owns the target skill file
    #[error("Skill file {} already belongs to rule '{owner}'", .path.display())]
    SkillPathTaken { path: PathBuf, owner: String },
}

impl From<anyhow::Error> for PipelineError {
    fn from(error: anyhow::Error) -> Self {
        PipelineError::Persistence(error)
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, PipelineError>;
