//! Error types for hawa-nav.
//!
//! Routing decisions never fail; these errors come from the layers around
//! the controller: shared session storage, configuration, replay scripts and
//! the CLI.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for hawa-nav operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the session database.
    #[error("failed to open session storage at {path}: {source}")]
    StorageOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A storage query failed.
    #[error("session storage query failed: {0}")]
    StorageQuery(#[from] rusqlite::Error),

    /// Failed to run storage migrations.
    #[error("session storage migration failed: {message}")]
    StorageMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Replay Errors ===
    /// A replay script line could not be understood.
    #[error("replay script line {line}: {message}")]
    ReplayStep {
        /// 1-based line number in the script.
        line: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// A replay step referenced a tab that was never opened.
    #[error("unknown tab '{0}'")]
    UnknownTab(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for hawa-nav operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a config validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a replay step error.
    #[must_use]
    pub fn replay_step(line: usize, message: impl Into<String>) -> Self {
        Self::ReplayStep {
            line,
            message: message.into(),
        }
    }

    /// Check if this error originated in session storage.
    #[must_use]
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            Self::StorageOpen { .. } | Self::StorageQuery(_) | Self::StorageMigration { .. }
        )
    }

    /// Check if this error is a configuration problem.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad(_) | Self::ConfigValidation { .. })
    }
}
