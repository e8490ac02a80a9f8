//! Core error types for medtrack-core.
//!
//! This module defines the error hierarchy using thiserror. Every layer of
//! the library (storage, configuration, notification transport, integrity
//! checks) has its own enum, wrapped by [`CoreError`] at the top.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for medtrack-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Notification transport errors
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Data-integrity violations
    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Entity lookup came back empty
    #[error("No {entity} found with id {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Notification transport errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// No delivery backend configured
    #[error("No mail relay configured; set notifications.relay_url")]
    NotConfigured,

    /// Transport-level send failure (connection, DNS, timeout)
    #[error("Failed to send to {recipient}: {message}")]
    SendFailed { recipient: String, message: String },

    /// The relay answered with a non-success status
    #[error("Mail relay rejected the message (HTTP {status}): {body}")]
    RelayRejected { status: u16, body: String },
}

/// Data-integrity violations. Surfaced loudly, never silently resolved.
#[derive(Error, Debug)]
pub enum IntegrityError {
    /// More than one active step in a single treatment
    #[error("Treatment {treatment_id} has {count} active steps; expected at most one")]
    MultipleActiveSteps { treatment_id: i64, count: u32 },

    /// Duplicate step order within a treatment
    #[error("Treatment {treatment_id} already has a step with order {order}")]
    DuplicateOrder { treatment_id: i64, order: u32 },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
