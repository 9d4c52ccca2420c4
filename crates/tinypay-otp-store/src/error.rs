//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data for key {key}: {reason}")]
    InvalidData { key: String, reason: String },

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding the backend was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// The blocking task running a database call failed.
    #[error("blocking task failed: {0}")]
    Task(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
