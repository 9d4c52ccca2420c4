//! # TinyPay OTP Store
//!
//! Persistence for a device's OTP chain state. Provides a trait-based
//! interface with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! State is persisted as string-keyed entries using the same keys the mobile
//! apps use, so a store can be inspected or migrated from an existing
//! key-value backend:
//!
//! | Key | Value |
//! |---|---|
//! | `indexHashMap` | JSON object `{"0": hex, ..., "999": hex}` |
//! | `unusedIndex` | decimal cursor |
//! | `payer_addr` | payer address |
//! | `lastSyncTimestamp` | generation timestamp (seconds, f64) |
//! | `chainExhausted` | `"true"` once index 0 has been used |
//! | `root` | root secret, only when the device opts in |
//!
//! ## Key Types
//!
//! - [`StateStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`StoredState`] - The decoded record
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tinypay_otp_store::{SqliteStore, StateStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("wallet.db").unwrap();
//!     if let Some(state) = store.load_state().await.unwrap() {
//!         println!("cursor at {}", state.unused_index);
//!     }
//! }
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod record;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use record::{keys, StoredState};
pub use sqlite::SqliteStore;
pub use traits::StateStore;
