//! Error types for a paired device.

use thiserror::Error;
use tinypay_otp_core::CoreError;
use tinypay_otp_store::StoreError;
use tinypay_otp_sync::SyncError;

/// Errors that can occur during device operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Chain state refused the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// The chain generation task failed.
    #[error("chain generation failed: {0}")]
    Generation(String),

    /// Configuration could not be read.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DeviceError {
    /// The chain-state error behind this one, if any.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            DeviceError::Core(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;
