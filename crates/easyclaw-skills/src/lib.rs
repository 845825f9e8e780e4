//! `EasyClaw` Skills
//!
//! Compiled action bundles become skills: a folder per skill holding a
//! `SKILL.md` whose YAML frontmatter carries `name` and `description`. The
//! external agent runtime discovers skills by scanning the skills root.
//!
//! - [`skill`] parses frontmatter and extracts the skill name
//! - [`writer`] writes and removes `<root>/<name>/SKILL.md`, pruning empty folders

#![deny(unsafe_code, dead_code, unused_imports, unused_variables, missing_docs)]

pub mod error;
pub mod skill;
pub mod writer;

pub use error::{NameExtractionError, SkillError};
pub use skill::{
    extract_skill_name, parse_frontmatter, skill_name_for_rule, skill_name_from_text, SkillMetadata,
};
pub use writer::{default_skills_root, SkillFileWriter, SKILL_FILE_NAME};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{extract_skill_name, SkillError, SkillFileWriter};
}
