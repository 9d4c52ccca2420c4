//! # TinyPay OTP Testkit
//!
//! Testing utilities for the TinyPay OTP engine.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known chains for cross-platform verification
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: A phone and a watch already paired in memory
//!
//! ## Golden Vectors
//!
//! ```rust
//! use tinypay_otp_testkit::vectors::{all_vectors, check_vector};
//!
//! for vector in all_vectors() {
//!     assert!(check_vector(&vector).is_ok(), "{}", vector.name);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use tinypay_otp_testkit::generators::snapshot;
//!
//! proptest! {
//!     #[test]
//!     fn decode_inverts_encode(s in snapshot()) {
//!         prop_assert_eq!(s.to_context().decode().0, s);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use tinypay_otp_testkit::fixtures::PairedDevices;
//!
//! async fn example() {
//!     let pair = PairedDevices::with_root("secret123", "0xpayer").await.unwrap();
//!     pair.phone.consume_one().await.unwrap();
//!     pair.deliver_to_watch().await.unwrap();
//!     assert!(pair.is_converged().await);
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{random_root, MemoryDevice, PairedDevices};
pub use vectors::{all_vectors, GoldenVector};
