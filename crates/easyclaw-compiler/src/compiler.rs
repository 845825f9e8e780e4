//! The deterministic rule compiler
//!
//! `compile` is pure, total and synchronous. It is the fallback for every
//! enhanced strategy, so it must never fail.

use easyclaw_skills::extract_skill_name;
use easyclaw_types::{ArtifactKind, CompileOutput};

use crate::classifier::classify;
use crate::error::CompileStrategyError;
use crate::generator::{generate, generate_for_rule};

/// Compile rule text into an artifact kind and payload
pub fn compile(text: &str) -> CompileOutput {
    let kind = classify(text);
    CompileOutput::new(kind, generate(kind, text))
}

/// Compile on behalf of a stored rule
///
/// Same as [`compile`] except that action bundles get a skill name derived
/// from `rule_id` too, so no two rules materialize into the same folder.
pub fn compile_for_rule(rule_id: &str, text: &str) -> CompileOutput {
    let kind = classify(text);
    CompileOutput::new(kind, generate_for_rule(kind, text, rule_id))
}

/// Check that output produced outside [`compile`] can be stored as-is
pub fn validate_output(output: &CompileOutput) -> Result<(), CompileStrategyError> {
    if output.content.trim().is_empty() {
        return Err(CompileStrategyError::Malformed("empty content".to_string()));
    }

    match output.kind {
        ArtifactKind::PolicyFragment => Ok(()),
        ArtifactKind::Guard => {
            let value: serde_json::Value = serde_json::from_str(&output.content)
                .map_err(|e| CompileStrategyError::Malformed(format!("guard is not JSON: {}", e)))?;
            if value.is_object() {
                Ok(())
            } else {
                Err(CompileStrategyError::Malformed(
                    "guard is not a JSON object".to_string(),
                ))
            }
        }
        ArtifactKind::ActionBundle => extract_skill_name(&output.content)
            .map(|_| ())
            .map_err(|e| CompileStrategyError::Malformed(format!("action bundle: {}", e))),
    }
}
