//! Configuration management for fieldcheck
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// REST server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Draft retention configuration
    #[serde(default)]
    pub drafts: DraftConfig,

    /// Submission behaviour
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// REST server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    #[serde(default = "default_server_bind")]
    pub bind: String,

    /// Maximum accepted request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Draft retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftConfig {
    /// Days without a save after which a draft is stale
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: i64,

    /// Hours within which a save counts as recent
    #[serde(default = "default_recent_within_hours")]
    pub recent_within_hours: i64,
}

/// Submission behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Company stored when the form omits one
    #[serde(default = "default_installation_company")]
    pub default_installation_company: String,

    /// Form key carrying the installation company
    #[serde(default = "default_company_key")]
    pub company_key: String,

    /// Form key carrying the overall recommendation
    #[serde(default = "default_pass_recommendation_key")]
    pub pass_recommendation_key: String,

    /// Recommendation value that marks the installation verified
    #[serde(default = "default_pass_recommendation_value")]
    pub pass_recommendation_value: String,

    /// Evaluate each question's validation rules before writing answers
    #[serde(default = "default_enforce_question_rules")]
    pub enforce_question_rules: bool,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for fieldcheck data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_server_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            stale_after_days: default_stale_after_days(),
            recent_within_hours: default_recent_within_hours(),
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            default_installation_company: default_installation_company(),
            company_key: default_company_key(),
            pass_recommendation_key: default_pass_recommendation_key(),
            pass_recommendation_value: default_pass_recommendation_value(),
            enforce_question_rules: default_enforce_question_rules(),
        }
    }
}

impl Config {
    /// Get the default base directory for fieldcheck (~/.fieldcheck)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".fieldcheck")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("checklists.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("checklists.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if fieldcheck is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Parsed server bind address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server.bind.parse().map_err(|_| {
            Error::Config(format!(
                "server.bind is not a valid socket address: {}",
                self.server.bind
            ))
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        if self.server.max_body_bytes == 0 {
            return Err(Error::Config(
                "server.max_body_bytes must be positive".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }

        if self.drafts.stale_after_days < 1 {
            return Err(Error::Config(
                "drafts.stale_after_days must be at least 1".to_string(),
            ));
        }

        if self.drafts.recent_within_hours < 1 {
            return Err(Error::Config(
                "drafts.recent_within_hours must be at least 1".to_string(),
            ));
        }

        if self.submission.pass_recommendation_key.trim().is_empty()
            || self.submission.company_key.trim().is_empty()
        {
            return Err(Error::Config(
                "submission form keys must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
