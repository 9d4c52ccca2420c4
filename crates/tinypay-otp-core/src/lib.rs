//! # TinyPay OTP Core
//!
//! Pure primitives for the TinyPay OTP engine: hash chains, chain state,
//! and the payment-code formats shown to counterparties.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over SHA-256 hash chains.
//!
//! ## Key Types
//!
//! - [`Digest`] - A 32-byte SHA-256 output, rendered as lowercase hex
//! - [`Chain`] - The 1000-entry OTP chain derived from a root secret
//! - [`ChainState`] - Chain + cursor + payer address, with monotonic consumption
//! - [`PaymentCode`] / [`ScanUri`] - What gets encoded into QR codes
//!
//! ## Chain Layout
//!
//! ```text
//! root ──H──> chain[0] ──H──> chain[1] ── ... ──H──> chain[998] ──H──> chain[999] (tail)
//!                                                       ^
//!                                                  first code shown
//! ```
//!
//! Each step hashes the lowercase hex text of the previous digest. Codes are
//! handed out from index 998 downward, so a verifier holding the tail can
//! check any presented code by hashing forward.

pub mod chain;
pub mod code;
pub mod digest;
pub mod error;
pub mod index_map;
pub mod state;
pub mod verify;

pub use chain::{generate, step, Chain, CHAIN_LENGTH, INITIAL_CURSOR, TAIL_INDEX};
pub use code::{PaymentCode, ScanUri, SCAN_SCHEME};
pub use digest::Digest;
pub use error::{CoreError, Result};
pub use index_map::{chain_from_index_map, chain_to_index_map, IndexMapEntryError};
pub use state::{ChainState, CurrentCode};
pub use verify::{steps_to_commitment, verify_step};
