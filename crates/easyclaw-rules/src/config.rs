use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use easyclaw_compiler::{ChatCompletionConfig, DEFAULT_CONCURRENCY, DEFAULT_POLICY_VIEW_LENGTH};

/// Default config template created when no config exists
const DEFAULT_CONFIG: &str = r#"
[database]
path = "~/.easyclaw/easyclaw.db"

[skills]
root = "~/.easyclaw/openclaw/skills"  # Set via EASYCLAW_SKILLS_DIR env var

[compiler]
max_policy_length = 4000
concurrency = 4

[compiler.enhanced]
enabled = false
base_url = "http://127.0.0.1:18789/v1"  # Set via EASYCLAW_GATEWAY_URL env var
model = "default"
api_key = ""  # Set via EASYCLAW_GATEWAY_TOKEN env var
timeout_secs = 30

[logging]
level = "info"  # trace, debug, info, warn, error
"#;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SkillsConfig {
    pub root: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnhancedConfig {
    #[serde(default)]
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl EnhancedConfig {
    pub fn to_chat_config(&self) -> ChatCompletionConfig {
        ChatCompletionConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone().filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompilerConfig {
    #[serde(default = "default_max_policy_length")]
    pub max_policy_length: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    pub enhanced: Option<EnhancedConfig>,
}

fn default_max_policy_length() -> usize {
    DEFAULT_POLICY_VIEW_LENGTH
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub skills: SkillsConfig,
    pub compiler: CompilerConfig,
    pub logging: LoggingConfig,
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches(['/', '\\'])),
        _ => PathBuf::from(path),
    }
}

impl Config {
    /// Get the global config path: ~/.easyclaw/easyclaw.toml
    fn global_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".easyclaw").join("easyclaw.toml"))
    }

    /// Ensure global config directory and file exist, creating defaults if needed
    fn ensure_global_config() -> Result<PathBuf> {
        let config_path = Self::global_config_path()?;

        if let Some(config_dir) = config_path.parent() {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir)?;
                eprintln!("Created config directory: {}", config_dir.display());
            }
        }

        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG.trim())?;
            eprintln!("Created default config: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Load configuration with layered approach:
    /// 1. Global config: ~/.easyclaw/easyclaw.toml (auto-created if missing)
    /// 2. Local override: ./easyclaw.toml (workspace, optional)
    /// 3. Environment variables (highest priority)
    pub fn load() -> Result<Self> {
        // Load .env file from current directory
        dotenvy::dotenv().ok();

        let global_config_path = Self::ensure_global_config()?;

        // Later sources override earlier ones
        let mut config_builder = config::Config::builder()
            .add_source(config::File::from_str(
                DEFAULT_CONFIG,
                config::FileFormat::Toml,
            ))
            .add_source(config::File::from(global_config_path))
            .add_source(config::File::with_name("easyclaw").required(false))
            .add_source(config::Environment::with_prefix("EASYCLAW").separator("__"));

        // Convenience env var overrides
        if let Ok(dir) = env::var("EASYCLAW_SKILLS_DIR") {
            config_builder = config_builder.set_override("skills.root", dir)?;
        }

        if let Ok(url) = env::var("EASYCLAW_GATEWAY_URL") {
            config_builder = config_builder.set_override("compiler.enhanced.base_url", url)?;
        }

        if let Ok(token) = env::var("EASYCLAW_GATEWAY_TOKEN") {
            config_builder = config_builder.set_override("compiler.enhanced.api_key", token)?;
        }

        let config: Self = config_builder.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn database_path(&self) -> PathBuf {
        expand_home(&self.database.path)
    }

    pub fn skills_root(&self) -> PathBuf {
        expand_home(&self.skills.root)
    }

    /// The enhanced strategy settings, when enabled
    pub fn enhanced(&self) -> Option<&EnhancedConfig> {
        self.compiler.enhanced.as_ref().filter(|e| e.enabled)
    }
}
