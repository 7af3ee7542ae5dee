//! # Engine Configuration
//!
//! Configuration management for the engine and the binary that hosts it.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     DENORM_WRITE_POLICY=deferred                                        │
//! │     DENORM_DB_PATH=/var/lib/denorm/views.db                             │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/denorm/denorm.toml (Linux)                                │
//! │     ~/Library/Application Support/dev.denorm.denorm/denorm.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     WritePolicy::Immediate, ./denorm.db                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # denorm.toml
//! [write]
//! policy = "immediate"   # immediate | deferred
//! queue_capacity = 1024
//!
//! [logging]
//! filter = "info,denorm=debug,sqlx=warn"
//!
//! [storage]
//! path = "denorm.db"
//! max_connections = 5
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::scheduler::{WritePolicy, DEFAULT_QUEUE_CAPACITY};

// =============================================================================
// Sections
// =============================================================================

/// View write behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSettings {
    /// Process-wide default policy; single operations may override it.
    #[serde(default)]
    pub policy: WritePolicy,

    /// Deferred jobs callers may have outstanding before a write waits.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for WriteSettings {
    fn default() -> Self {
        WriteSettings {
            policy: WritePolicy::default(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directives, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info,denorm=debug,sqlx=warn".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

/// SQLite document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Database file, created if missing.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("denorm.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub write: WriteSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl EngineConfig {
    /// Loads configuration: defaults, then file, then environment.
    ///
    /// Without an explicit path the platform config directory is tried; a
    /// missing file is not an error.
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.write.queue_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "write.queue_capacity must be greater than 0".into(),
            ));
        }

        if self.storage.max_connections == 0 {
            return Err(EngineError::InvalidConfig(
                "storage.max_connections must be greater than 0".into(),
            ));
        }

        if self.logging.filter.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "logging.filter must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Applies `DENORM_*` overrides looked up through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(policy) = var("DENORM_WRITE_POLICY") {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding write policy from environment");
                    self.write.policy = parsed;
                }
                Err(_) => warn!(policy = %policy, "Unknown write policy in environment"),
            }
        }

        if let Some(capacity) = var("DENORM_QUEUE_CAPACITY") {
            if let Ok(c) = capacity.parse::<usize>() {
                self.write.queue_capacity = c;
            }
        }

        if let Some(filter) = var("DENORM_LOG") {
            self.logging.filter = filter;
        }

        if let Some(path) = var("DENORM_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.storage.path = PathBuf::from(path);
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "denorm", "denorm")
            .map(|dirs| dirs.config_dir().join("denorm.toml"))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
