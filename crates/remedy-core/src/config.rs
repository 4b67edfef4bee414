//! Configuration file support.
//!
//! Settings are read from TOML. A global file (`~/.remedy/config.toml`) is
//! overridden by a local one (`./remedy.toml`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ActionType;

const DEFAULT_DATABASE_PATH: &str = "remedy.db";
const DEFAULT_SYSTEM_ACTOR_ID: &str = "playbook-engine";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Log level
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { database_path: default_database_path() }
    }
}

/// Step execution engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Action types that only a human may complete
    #[serde(default = "default_risky_action_types")]
    pub risky_action_types: Vec<ActionType>,

    /// Actor id recorded on events the engine emits on its own behalf
    #[serde(default = "default_system_actor_id")]
    pub system_actor_id: String,
}

fn default_risky_action_types() -> Vec<ActionType> {
    vec![ActionType::CallTool]
}

fn default_system_actor_id() -> String {
    DEFAULT_SYSTEM_ACTOR_ID.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risky_action_types: default_risky_action_types(),
            system_actor_id: default_system_actor_id(),
        }
    }
}

impl EngineConfig {
    /// Checks whether completing a step of this action type requires a human.
    pub fn is_risky(&self, action_type: &ActionType) -> bool {
        self.risky_action_types.contains(action_type)
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".remedy")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from("remedy.toml")
    }

    /// Discover and load configuration files.
    ///
    /// Loads configuration from:
    /// 1. Global config (~/.remedy/config.toml)
    /// 2. Local config (./remedy.toml)
    ///
    /// Local config overrides global config. Missing or unreadable files are
    /// skipped.
    pub fn discover_and_load() -> Self {
        let mut config = Self::default();

        if let Ok(global_config) = Self::load_from_file(&Self::default_global_path()) {
            config.merge(&global_config);
        }

        if let Ok(local_config) = Self::load_from_file(&Self::default_local_path()) {
            config.merge(&local_config);
        }

        config
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` when they differ from
    /// the defaults.
    pub fn merge(&mut self, other: &Self) {
        if other.storage.database_path != DEFAULT_DATABASE_PATH {
            self.storage.database_path.clone_from(&other.storage.database_path);
        }
        if other.engine.risky_action_types != default_risky_action_types() {
            self.engine.risky_action_types.clone_from(&other.engine.risky_action_types);
        }
        if other.engine.system_actor_id != DEFAULT_SYSTEM_ACTOR_ID {
            self.engine.system_actor_id.clone_from(&other.engine.system_actor_id);
        }
        if let Some(ref log_level) = other.log_level {
            self.log_level = Some(log_level.clone());
        }
    }
}
