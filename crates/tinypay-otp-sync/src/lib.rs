//! # TinyPay OTP Sync
//!
//! Keeps the phone's and the watch's copies of an OTP chain convergent.
//!
//! ## Overview
//!
//! Either device may consume codes while the other is asleep or out of
//! range. Each side pushes snapshots of its state through a [`Transport`];
//! the receiving side merges them with a [`SyncReconciler`]. The transport
//! is allowed to drop, coalesce and reorder, so the merge has to be safe
//! under all three.
//!
//! ## Key Properties
//!
//! - **Monotonic**: within a chain generation the cursor only moves down
//! - **Idempotent**: replaying a snapshot changes nothing
//! - **Commutative**: index-only snapshots merge the same in any order
//! - **Latest generation wins**: a newer chain supersedes regardless of cursor
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tinypay_otp_core::{generate, ChainState};
//! use tinypay_otp_sync::{MemoryLink, SyncReconciler, SyncSnapshot, Transport};
//!
//! async fn example() {
//!     let (phone_link, watch_link) = MemoryLink::pair();
//!
//!     let mut phone = ChainState::new();
//!     phone.initialize(generate("root"), "0xpayer", 1_700_000_000.0);
//!     phone_link
//!         .update_context(SyncSnapshot::full(&phone).to_context())
//!         .await
//!         .unwrap();
//!
//!     let mut watch = ChainState::new();
//!     let (snapshot, _dropped) = watch_link.recv().await.unwrap().decode();
//!     SyncReconciler::default().reconcile(&mut watch, &snapshot);
//!     assert_eq!(watch.cursor(), phone.cursor());
//! }
//! ```
//!
//! ## Message Flow
//!
//! The link keeps only the latest context, so a device always sends a full
//! snapshot:
//!
//! ```text
//! Phone                                              Watch
//!   |-- hashDict+unusedIndex+payer_addr+timestamp -->|   new root entered on phone
//!   |<------------ same, unusedIndex 997 ------------|   watch showed a code
//!   |------------- same, unusedIndex 996 ----------->|   phone showed a code
//!   |------------- same, new payer_addr ------------>|   address edited
//! ```
//!
//! Index-only and address-only payloads are still merged. Nothing is
//! acknowledged and nothing is echoed back.

pub mod convergence;
pub mod error;
pub mod messages;
pub mod reconcile;
pub mod transport;

pub use convergence::{matches_fingerprint, state_fingerprint, verify_convergence, ConvergenceResult};
pub use error::{Result, SyncError};
pub use messages::{wire_keys, ApplicationContext, MalformedEntry, SyncSnapshot};
pub use reconcile::{ReconcileConfig, ReconcileOutcome, StateChange, SyncReconciler};
pub use transport::{memory::MemoryEndpoint, memory::MemoryLink, Transport};
