use crate::{Artifact, RuleId};
use serde::{Deserialize, Serialize};

/// Events published by the artifact pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// A rule compiled successfully
    Compiled {
        rule_id: RuleId,
        artifact: Artifact,
    },

    /// Compiling a rule failed; any previous artifact keeps its content
    Failed {
        rule_id: RuleId,
        error: String,
    },
}

impl PipelineEvent {
    pub fn rule_id(&self) -> &str {
        match self {
            PipelineEvent::Compiled { rule_id, .. } | PipelineEvent::Failed { rule_id, .. } => {
                rule_id
            }
        }
    }
}
