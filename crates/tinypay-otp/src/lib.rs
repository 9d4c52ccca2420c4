//! # TinyPay OTP
//!
//! One-time payment codes from a precomputed SHA-256 hash chain, kept in
//! step between a phone and a paired watch.
//!
//! ## Overview
//!
//! A root secret entered on one device is expanded into a 1000-entry chain.
//! Codes are handed out from index 998 downward; the tail at index 999 is
//! what a verifier registers. Both devices may show codes while apart, so
//! each one keeps its own copy and they reconcile through snapshots:
//!
//! - **New chain**: supersedes whatever the peer had
//! - **Cursor**: merged by minimum, so a code used anywhere stays used
//! - **Address**: last write wins
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tinypay_otp::{DeviceConfig, DeviceRole, PeerDevice};
//! use tinypay_otp::store::MemoryStore;
//! use tinypay_otp::sync::MemoryLink;
//!
//! async fn example() {
//!     let (phone_link, watch_link) = MemoryLink::pair();
//!
//!     let phone = PeerDevice::open(DeviceConfig::for_role(DeviceRole::Phone), MemoryStore::new(), phone_link)
//!         .await
//!         .unwrap();
//!     let watch = Arc::new(
//!         PeerDevice::open(DeviceConfig::for_role(DeviceRole::Watch), MemoryStore::new(), watch_link)
//!             .await
//!             .unwrap(),
//!     );
//!
//!     // Apply the phone's updates on the watch as they arrive.
//!     let pump = Arc::clone(&watch);
//!     tokio::spawn(async move { pump.run_inbound().await });
//!
//!     let code = phone.submit_root("correct horse", "0xpayer").await.unwrap();
//!     println!("show {}", code.payment_code());
//!
//!     // After the counterparty scans it:
//!     phone.consume_one().await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `tinypay_otp::core` - Chains, chain state, payment codes
//! - `tinypay_otp::store` - Persistence
//! - `tinypay_otp::sync` - Snapshots, reconciliation, transports

pub mod config;
pub mod device;
pub mod error;

// Re-export component crates
pub use tinypay_otp_core as core;
pub use tinypay_otp_store as store;
pub use tinypay_otp_sync as sync;

pub use config::{DeviceConfig, DeviceRole};
pub use device::{DeviceId, PeerDevice};
pub use error::{DeviceError, Result};

// Re-export commonly used types
pub use tinypay_otp_core::{
    generate, Chain, ChainState, CoreError, CurrentCode, Digest, PaymentCode, ScanUri,
    INITIAL_CURSOR, TAIL_INDEX,
};
pub use tinypay_otp_sync::{ApplicationContext, StateChange, SyncSnapshot};
