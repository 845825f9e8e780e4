//! EasyClaw Types - Core types for the rule compilation pipeline
//!
//! This module defines the data shared between the stores, the compiler and
//! the skill lifecycle: user-authored rules, the artifacts compiled from them
//! and the events the pipeline publishes.

mod artifact;
mod events;
mod rule;

pub use artifact::{
    Artifact, ArtifactId, ArtifactKind, ArtifactStatus, ArtifactUpdate, GuardPayload,
    ParseEnumError,
};
pub use events::PipelineEvent;
pub use rule::{Rule, RuleId};

use serde::{Deserialize, Serialize};

/// Result of compiling a rule's text: the artifact kind and its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOutput {
    pub kind: ArtifactKind,
    pub content: String,
}

impl CompileOutput {
    pub fn new(kind: ArtifactKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }
}
