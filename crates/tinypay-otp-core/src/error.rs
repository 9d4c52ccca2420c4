//! Error types for the TinyPay OTP core.

use thiserror::Error;

/// Errors raised by chain generation, chain state, and code parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// No chain has been loaded yet.
    #[error("no OTP chain loaded")]
    NotReady,

    /// A chain is loaded but no payer address is bound to it.
    #[error("payer address missing")]
    AddressMissing,

    /// Every code of the current chain has been used.
    #[error("OTP chain exhausted; submit a new root")]
    IndexExhausted,

    /// Consumption was attempted at cursor 0.
    #[error("OTP chain already exhausted")]
    AlreadyExhausted,

    /// The root secret was empty.
    #[error("root secret must not be empty")]
    EmptyRoot,

    /// Externally supplied chain data does not form a valid chain.
    #[error("malformed chain: {0}")]
    MalformedChain(String),

    /// A digest could not be parsed.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// A scanned or displayed payment code could not be parsed.
    #[error("invalid payment code: {0}")]
    InvalidPaymentCode(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
