//! Materialize skills as `<root>/<name>/SKILL.md`

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::SkillError;

/// File name the agent runtime looks for inside each skill folder
pub const SKILL_FILE_NAME: &str = "SKILL.md";

/// Default skills root: `~/.easyclaw/openclaw/skills`
pub fn default_skills_root() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".easyclaw").join("openclaw").join("skills"))
}

/// Writes and removes skill files under a single skills root
#[derive(Debug, Clone)]
pub struct SkillFileWriter {
    root: PathBuf,
}

impl SkillFileWriter {
    /// Create a writer rooted at `root`; nothing is created until the first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The skills root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the skill called `name` lives
    pub fn skill_path(&self, name: &str) -> PathBuf {
        self.root.join(name).join(SKILL_FILE_NAME)
    }

    /// Write `content` to `<root>/<name>/SKILL.md`, overwriting any previous
    /// file, and return its absolute path
    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf, SkillError> {
        let skill_dir = self.root.join(name);
        fs::create_dir_all(&skill_dir).map_err(|e| SkillError::io(&skill_dir, e))?;

        let skill_file = skill_dir.join(SKILL_FILE_NAME);
        fs::write(&skill_file, content).map_err(|e| SkillError::io(&skill_file, e))?;

        let absolute = fs::canonicalize(&skill_file).map_err(|e| SkillError::io(&skill_file, e))?;
        info!("Wrote skill '{}' to {}", name, absolute.display());
        Ok(absolute)
    }

    /// Delete a skill file and its folder if that leaves the folder empty
    ///
    /// Returns `false` when the file was already gone.
    pub fn remove(&self, path: &Path) -> Result<bool, SkillError> {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Skill file already absent: {}", path.display());
                return Ok(false);
            }
            Err(e) => return Err(SkillError::io(path, e)),
        }
        info!("Removed skill file {}", path.display());

        if let Some(parent) = path.parent() {
            self.remove_dir_if_empty(parent)?;
        }

        Ok(true)
    }

    fn remove_dir_if_empty(&self, dir: &Path) -> Result<(), SkillError> {
        if self.is_root(dir) {
            return Ok(());
        }

        let mut entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(SkillError::io(dir, e)),
        };
        if entries.next().is_some() {
            debug!("Keeping non-empty skill directory {}", dir.display());
            return Ok(());
        }

        match fs::remove_dir(dir) {
            Ok(()) => {
                debug!("Removed empty skill directory {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SkillError::io(dir, e)),
        }
    }

    fn is_root(&self, dir: &Path) -> bool {
        if dir == self.root {
            return true;
        }
        match (fs::canonicalize(dir), fs::canonicalize(&self.root)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
