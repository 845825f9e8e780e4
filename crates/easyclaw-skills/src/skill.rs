//! Skill frontmatter parsing
//!
//! A SKILL.md starts with a YAML block delimited by `---` lines:
//!
//! ```text
//! ---
//! name: summarize-documents
//! description: "Summarize documents"
//! ---
//! # Body
//! ```

use regex::Regex;
use serde_yaml::Value;
use std::sync::LazyLock;
use tracing::warn;

use crate::error::NameExtractionError;

/// Maximum conventional name length
pub const MAX_NAME_LENGTH: usize = 64;
/// Maximum conventional description length
pub const MAX_DESCRIPTION_LENGTH: usize = 1024;

const FRONTMATTER_DELIMITER: &str = "---";
const FALLBACK_NAME_PREFIX: &str = "skill";

/// Hex digits of the per-rule suffix, plus its hyphen
const RULE_SUFFIX_LENGTH: usize = 9;

static CONVENTIONAL_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").ok());

/// Skill metadata extracted from YAML frontmatter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillMetadata {
    /// Skill name, used as the folder name under the skills root
    pub name: String,
    /// Skill description, empty when the frontmatter has none
    pub description: String,
}

/// Split content into its raw YAML frontmatter and the body that follows
fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split_inclusive('\n');

    let first = lines.next()?;
    if first.trim() != FRONTMATTER_DELIMITER {
        return None;
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end() == FRONTMATTER_DELIMITER {
            let yaml = &content[yaml_start..offset];
            let body = &content[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }

    None
}

/// Parse skill content into frontmatter metadata and body
pub fn parse_frontmatter(content: &str) -> Result<(SkillMetadata, String), NameExtractionError> {
    let (yaml_str, body) =
        split_frontmatter(content).ok_or(NameExtractionError::MissingFrontmatter)?;

    if yaml_str.trim().is_empty() {
        return Err(NameExtractionError::MissingName);
    }

    let yaml: Value = serde_yaml::from_str(yaml_str)
        .map_err(|e| NameExtractionError::InvalidYaml(e.to_string()))?;
    if !yaml.is_mapping() {
        return Err(NameExtractionError::InvalidYaml(
            "frontmatter is not a mapping".to_string(),
        ));
    }

    let name = match yaml.get("name") {
        None => return Err(NameExtractionError::MissingName),
        Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(NameExtractionError::InvalidYaml(format!(
                "`name` must be a string, got {:?}",
                other
            )))
        }
    };

    let description = yaml
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    Ok((SkillMetadata { name, description }, body.to_string()))
}

/// Extract the skill name from action-bundle content
///
/// Fails when the frontmatter is absent, has no `name`, or the name is empty
/// or not usable as a single path component.
pub fn extract_skill_name(content: &str) -> Result<String, NameExtractionError> {
    let (metadata, _) = parse_frontmatter(content)?;
    validate_name(&metadata.name)?;
    Ok(metadata.name)
}

fn validate_name(name: &str) -> Result<(), NameExtractionError> {
    if name.is_empty() {
        return Err(NameExtractionError::EmptyName);
    }

    if name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || name.chars().any(char::is_control)
    {
        return Err(NameExtractionError::UnsafeName(name.to_string()));
    }

    if name.len() > MAX_NAME_LENGTH {
        warn!(
            "Skill name '{}' exceeds {} characters (was {})",
            name,
            MAX_NAME_LENGTH,
            name.len()
        );
    }

    if !is_conventional_name(name) {
        warn!(
            "Skill name '{}' should contain only lowercase letters, numbers, and hyphens",
            name
        );
    }

    Ok(())
}

fn is_conventional_name(name: &str) -> bool {
    CONVENTIONAL_NAME
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

/// Derive a conventional skill name (lowercase, digits, hyphens) from free text
///
/// Deterministic; text without any ASCII alphanumerics gets a stable
/// hash-based name.
pub fn skill_name_from_text(text: &str) -> String {
    let name = slug(text, MAX_NAME_LENGTH);
    if name.is_empty() {
        return format!("{}-{:08x}", FALLBACK_NAME_PREFIX, fnv1a(text));
    }
    name
}

/// Skill name owned by one rule: the text slug plus a hash of the rule id
///
/// Two rules never share a name, even when their texts only differ in case
/// or punctuation.
pub fn skill_name_for_rule(text: &str, rule_id: &str) -> String {
    let base = slug(text, MAX_NAME_LENGTH - RULE_SUFFIX_LENGTH);
    let base = if base.is_empty() {
        FALLBACK_NAME_PREFIX
    } else {
        base.as_str()
    };
    format!("{}-{:08x}", base, fnv1a(rule_id))
}

/// Lowercase ASCII words joined by `-`, whole words only, at most `max_length` bytes
fn slug(text: &str, max_length: usize) -> String {
    let mut name = String::new();

    for word in text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let separator = usize::from(!name.is_empty());
        if name.len() + separator + word.len() > max_length {
            break;
        }
        if separator == 1 {
            name.push('-');
        }
        name.push_str(&word.to_ascii_lowercase());
    }

    name
}

fn fnv1a(text: &str) -> u32 {
    text.bytes().fold(0x811c_9dc5_u32, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frontmatter() {
        let content = r#"---
name: code-reviewer
description: Reviews code for best practices and security. Use when reviewing or analyzing code.
---

# Code Reviewer

This skill helps review code.
"#;

        let (metadata, body) = parse_frontmatter(content).unwrap();
        assert_eq!(metadata.name, "code-reviewer");
        assert_eq!(
            metadata.description,
            "Reviews code for best practices and security. Use when reviewing or analyzing code."
        );
        assert!(body.contains("# Code Reviewer"));
    }

    #[test]
    fn test_extract_name_with_crlf_and_quotes() {
        let content = "---\r\nname: \"summarize-docs\"\r\ndescription: x\r\n---\r\nbody";
        assert_eq!(extract_skill_name(content).unwrap(), "summarize-docs");
    }

    #[test]
    fn test_extract_name_failures() {
        assert_eq!(
            extract_skill_name("# Just a heading\nname: nope"),
            Err(NameExtractionError::MissingFrontmatter)
        );
        assert_eq!(
            extract_skill_name("---\nname: unterminated\n"),
            Err(NameExtractionError::MissingFrontmatter)
        );
        assert_eq!(
            extract_skill_name("---\ndescription: no name\n---\n"),
            Err(NameExtractionError::MissingName)
        );
        assert_eq!(
            extract_skill_name("---\nname:\n---\n"),
            Err(NameExtractionError::EmptyName)
        );
        assert_eq!(
            extract_skill_name("---\nname: \"   \"\n---\n"),
            Err(NameExtractionError::EmptyName)
        );
        assert_eq!(
            extract_skill_name("---\nname: ../escape\n---\n"),
            Err(NameExtractionError::UnsafeName("../escape".to_string()))
        );
        assert!(matches!(
            extract_skill_name("---\n- a\n- b\n---\n"),
            Err(NameExtractionError::InvalidYaml(_))
        ));
    }

    #[test]
    fn test_skill_name_from_text() {
        assert_eq!(
            skill_name_from_text("Add a skill to summarize documents"),
            "add-a-skill-to-summarize-documents"
        );
        assert_eq!(skill_name_from_text("  Enable: PDF export!! "), "enable-pdf-export");

        let long = "word ".repeat(40);
        let name = skill_name_from_text(&long);
        assert!(name.len() <= MAX_NAME_LENGTH);
        assert!(!name.ends_with('-'));
    }

    #[test]
    fn test_skill_name_from_text_without_ascii_is_stable() {
        let a = skill_name_from_text("启用技能");
        let b = skill_name_from_text("启用技能");
        assert_eq!(a, b);
        assert!(a.starts_with("skill-"));
        assert_ne!(a, skill_name_from_text("另一个技能"));
    }

    #[test]
    fn test_skill_name_for_rule_is_unique_per_rule() {
        let a = skill_name_for_rule("Enable PDF export", "rule-a");
        let b = skill_name_for_rule("enable pdf export!", "rule-b");
        assert_ne!(a, b);
        assert!(a.starts_with("enable-pdf-export-"));
        assert!(b.starts_with("enable-pdf-export-"));
        assert_eq!(a, skill_name_for_rule("Enable PDF export", "rule-a"));

        let long = skill_name_for_rule(&"word ".repeat(40), "rule-a");
        assert!(long.len() <= MAX_NAME_LENGTH);
        assert!(is_conventional_name(&long));

        assert!(skill_name_for_rule("启用技能", "rule-a").starts_with("skill-"));
    }

    #[test]
    fn test_conventional_name() {
        assert!(is_conventional_name("summarize-docs-2"));
        assert!(!is_conventional_name("Summarize Docs"));
        assert!(!is_conventional_name(""));
    }
}
