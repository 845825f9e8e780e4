//! Error types for skill parsing and materialization

use std::path::PathBuf;
use thiserror::Error;

/// Action-bundle content lacks a usable `name:`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NameExtractionError {
    /// No `---` delimited block at the top of the content
    #[error("No valid YAML frontmatter found")]
    MissingFrontmatter,

    /// Frontmatter is not a YAML mapping
    #[error("Invalid YAML frontmatter: {0}")]
    InvalidYaml(String),

    /// Frontmatter has no `name` key
    #[error("Frontmatter has no `name` field")]
    MissingName,

    /// `name` is present but blank
    #[error("Skill name cannot be empty")]
    EmptyName,

    /// `name` would escape its folder under the skills root
    #[error("Skill name '{0}' cannot be used as a directory name")]
    UnsafeName(String),
}

/// Skill materialization errors
#[derive(Debug, Error)]
pub enum SkillError {
    /// Content has no usable skill name
    #[error(transparent)]
    NameExtraction(#[from] NameExtractionError),

    /// Write, delete or mkdir failed
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        /// Path being touched
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl SkillError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SkillError::Filesystem {
            path: path.into(),
            source,
        }
    }
}
