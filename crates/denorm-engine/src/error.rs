//! # Engine Error Types
//!
//! Errors raised while setting the engine up. Registration and propagation
//! failures keep their core types ([`ConfigError`], [`SyncError`]); this type
//! wraps them for callers that want a single error.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐  │
//! │  │  Configuration  │  │  Registration   │  │     Propagation         │  │
//! │  │                 │  │                 │  │                         │  │
//! │  │  InvalidConfig  │  │  Config(..)     │  │  Sync(..)               │  │
//! │  │  ConfigLoad..   │  │                 │  │                         │  │
//! │  │  ConfigSave..   │  │                 │  │                         │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use denorm_core::{ConfigError, SyncError};
use thiserror::Error;

/// Result type alias for engine setup.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid engine configuration.
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// A spec or dependency binding was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Processing or a view write failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::ConfigSaveFailed(err.to_string())
    }
}
