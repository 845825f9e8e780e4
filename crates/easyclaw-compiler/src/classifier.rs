//! Keyword classification of rule text
//!
//! Precedence: guard keywords, then action-bundle keywords, then policy.

use easyclaw_types::ArtifactKind;

/// Phrases that turn a rule into a hard guard
pub const GUARD_KEYWORDS: &[&str] = &[
    "block",
    "deny",
    "denied",
    "forbid",
    "forbidden",
    "prevent",
    "must not",
    "never",
    "restrict",
    "prohibit",
    "disallow",
    "not allowed",
];

/// Phrases that turn a rule into an installable skill
pub const ACTION_BUNDLE_KEYWORDS: &[&str] = &[
    "skill",
    "action",
    "capability",
    "ability",
    "enable",
    "workflow",
    "automate",
];

/// Classify rule text into an artifact kind
pub fn classify(text: &str) -> ArtifactKind {
    let words = words(text);

    if contains_any(&words, GUARD_KEYWORDS) {
        ArtifactKind::Guard
    } else if contains_any(&words, ACTION_BUNDLE_KEYWORDS) {
        ArtifactKind::ActionBundle
    } else {
        ArtifactKind::PolicyFragment
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_any(words: &[String], keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| contains_phrase(words, keyword))
}

/// Endings accepted after the last word of a phrase ("blocked", "skills")
const INFLECTIONS: &[&str] = &["s", "es", "d", "ed", "ing", "ion", "ions"];

/// Whole word, or the keyword plus a regular inflection
///
/// A trailing `e` may be dropped before `ing`/`ion` ("enabling", "automation").
fn is_inflection_of(word: &str, keyword: &str) -> bool {
    if word == keyword {
        return true;
    }

    let stems = [Some(keyword), keyword.strip_suffix('e')];
    stems.into_iter().flatten().any(|stem| {
        word.strip_prefix(stem)
            .is_some_and(|ending| INFLECTIONS.contains(&ending))
    })
}

/// Match a keyword phrase against consecutive words; the last word of the
/// phrase also matches its inflections
fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let parts: Vec<&str> = phrase.split_whitespace().collect();
    let Some((last, leading)) = parts.split_last() else {
        return false;
    };

    words.windows(parts.len()).any(|window| {
        window
            .iter()
            .zip(leading.iter())
            .all(|(word, part)| word == part)
            && window
                .last()
                .is_some_and(|word| is_inflection_of(word, last))
    })
}
