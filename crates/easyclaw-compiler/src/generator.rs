//! Payload generation per artifact kind

use easyclaw_skills::skill::MAX_DESCRIPTION_LENGTH;
use easyclaw_skills::{skill_name_for_rule, skill_name_from_text};
use easyclaw_types::ArtifactKind;
use serde_json::json;

/// Prefix of every policy fragment
pub const POLICY_PREFIX: &str = "[POLICY] ";

/// Maximum length of a guard condition, ellipsis included
pub const MAX_CONDITION_LENGTH: usize = 120;

const ELLIPSIS: &str = "...";

/// Generate the artifact content for `text` compiled as `kind`
pub fn generate(kind: ArtifactKind, text: &str) -> String {
    match kind {
        ArtifactKind::PolicyFragment => policy_fragment(text),
        ArtifactKind::Guard => guard(text),
        ArtifactKind::ActionBundle => action_bundle(text, &skill_name_from_text(text)),
    }
}

/// Like [`generate`], but action bundles get a skill name unique to `rule_id`
pub fn generate_for_rule(kind: ArtifactKind, text: &str, rule_id: &str) -> String {
    match kind {
        ArtifactKind::ActionBundle => action_bundle(text, &skill_name_for_rule(text, rule_id)),
        other => generate(other, text),
    }
}

fn policy_fragment(text: &str) -> String {
    format!("{}{}", POLICY_PREFIX, text)
}

fn guard(text: &str) -> String {
    json!({
        "kind": "guard",
        "action": "block",
        "reason": text,
        "condition": guard_condition(text),
    })
    .to_string()
}

/// Rule text cut to [`MAX_CONDITION_LENGTH`] characters, ending in `...` when cut
///
/// Always a prefix of the guard's `reason` up to the ellipsis.
pub fn guard_condition(text: &str) -> String {
    if text.chars().count() <= MAX_CONDITION_LENGTH {
        return text.to_string();
    }

    let keep = MAX_CONDITION_LENGTH - ELLIPSIS.len();
    let mut condition: String = text.chars().take(keep).collect();
    condition.push_str(ELLIPSIS);
    condition
}

fn action_bundle(text: &str, name: &str) -> String {
    format!(
        r#"---
name: {}
description: "{}"
---

# {}

{}

## Source

Compiled from a user rule.
"#,
        name,
        yaml_escape(&description(text)),
        title_case(&skill_name_from_text(text)),
        text
    )
}

/// Single-line description without control characters, capped at the conventional maximum
fn description(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_DESCRIPTION_LENGTH)
        .collect()
}

/// Escape for a YAML double-quoted scalar
fn yaml_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn title_case(name: &str) -> String {
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use easyclaw_skills::{extract_skill_name, parse_frontmatter};
    use easyclaw_types::GuardPayload;

    #[test]
    fn test_policy_fragment() {
        assert_eq!(
            generate(ArtifactKind::PolicyFragment, "Always respond in a polite tone"),
            "[POLICY] Always respond in a polite tone"
        );
    }

    #[test]
    fn test_guard_payload() {
        let content = generate(ArtifactKind::Guard, "Block all access to /etc/passwd");
        let payload: GuardPayload = serde_json::from_str(&content).unwrap();
        assert_eq!(payload.kind, "guard");
        assert_eq!(payload.action, "block");
        assert_eq!(payload.reason, "Block all access to /etc/passwd");
        assert_eq!(payload.condition, "Block all access to /etc/passwd");
    }

    #[test]
    fn test_guard_condition_truncation() {
        let exact = "x".repeat(MAX_CONDITION_LENGTH);
        assert_eq!(guard_condition(&exact), exact);

        let long = "é".repeat(MAX_CONDITION_LENGTH + 30);
        let condition = guard_condition(&long);
        assert_eq!(condition.chars().count(), MAX_CONDITION_LENGTH);
        assert!(condition.ends_with("..."));
    }

    #[test]
    fn test_action_bundle_frontmatter() {
        let text = "Add a skill to summarize documents";
        let content = generate(ArtifactKind::ActionBundle, text);

        assert!(content.starts_with("---\n"));
        assert!(content.contains("name: add-a-skill-to-summarize-documents"));
        assert!(content.contains("description:"));
        assert!(content.contains(text));
        assert_eq!(
            extract_skill_name(&content).unwrap(),
            "add-a-skill-to-summarize-documents"
        );
        assert!(content.contains("# Add A Skill To Summarize Documents"));
    }

    #[test]
    fn test_action_bundle_description_survives_yaml_specials() {
        let text = "Enable skill: \"quote\" handling\n  with a backslash \\ and # hash";
        let content = generate(ArtifactKind::ActionBundle, text);

        let (metadata, body) = parse_frontmatter(&content).unwrap();
        assert_eq!(
            metadata.description,
            "Enable skill: \"quote\" handling with a backslash \\ and # hash"
        );
        assert!(body.contains(text));
    }

    #[test]
    fn test_guard_condition_keeps_surrounding_whitespace() {
        let text = "  Block outgoing email \n";
        let payload: GuardPayload =
            serde_json::from_str(&generate(ArtifactKind::Guard, text)).unwrap();
        assert_eq!(payload.condition, payload.reason);

        let long = format!("  {}", "y".repeat(MAX_CONDITION_LENGTH));
        let condition = guard_condition(&long);
        assert!(long.starts_with(condition.trim_end_matches("...")));
    }

    #[test]
    fn test_rule_bundles_get_distinct_names() {
        let a = generate_for_rule(ArtifactKind::ActionBundle, "Enable PDF export", "rule-a");
        let b = generate_for_rule(ArtifactKind::ActionBundle, "enable pdf export!", "rule-b");

        let name_a = extract_skill_name(&a).unwrap();
        let name_b = extract_skill_name(&b).unwrap();
        assert_ne!(name_a, name_b);
        assert!(name_a.starts_with("enable-pdf-export-"));
        assert!(a.contains("# Enable Pdf Export\n"));

        assert_eq!(
            generate_for_rule(ArtifactKind::Guard, "Block x", "rule-a"),
            generate(ArtifactKind::Guard, "Block x")
        );
    }
}
