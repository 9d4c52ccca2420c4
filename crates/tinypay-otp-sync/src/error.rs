//! Error types for the sync module.

use thiserror::Error;

/// Errors that can occur while moving snapshots between devices.
///
/// Bad peer data is never an error here: individual entries are dropped and
/// reported as [`crate::MalformedEntry`] instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The peer cannot be reached and the update was not queued.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The link was closed by the other side.
    #[error("channel closed")]
    ChannelClosed,

    /// Timeout waiting for peer.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A payload could not be read as a key-value context at all.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
