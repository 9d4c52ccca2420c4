//! Proptest generators for property-based testing.

use proptest::prelude::*;

use tinypay_otp_core::{generate, Digest, INITIAL_CURSOR};
use tinypay_otp_sync::SyncSnapshot;

/// Generate a non-empty root secret.
pub fn root() -> impl Strategy<Value = String> {
    "[ -~]{1,32}".prop_map(String::from)
}

/// Generate a random Digest.
pub fn digest() -> impl Strategy<Value = Digest> {
    any::<[u8; 32]>().prop_map(Digest::from_bytes)
}

/// Generate a valid cursor.
pub fn cursor() -> impl Strategy<Value = u16> {
    0u16..=INITIAL_CURSOR
}

/// Generate a payer address.
pub fn payer_address() -> impl Strategy<Value = String> {
    "0x[0-9a-f]{8,40}".prop_map(String::from)
}

/// Generate a generation timestamp in seconds.
pub fn timestamp() -> impl Strategy<Value = f64> {
    (1_600_000_000u32..2_000_000_000).prop_map(f64::from)
}

/// Generate an index-only snapshot.
pub fn index_snapshot() -> impl Strategy<Value = SyncSnapshot> {
    cursor().prop_map(|cursor| SyncSnapshot {
        cursor: Some(cursor),
        ..SyncSnapshot::default()
    })
}

/// Generate a snapshot without a chain: any mix of cursor and address.
pub fn partial_snapshot() -> impl Strategy<Value = SyncSnapshot> {
    (prop::option::of(cursor()), prop::option::of(payer_address())).prop_map(
        |(cursor, payer_address)| SyncSnapshot {
            cursor,
            payer_address,
            ..SyncSnapshot::default()
        },
    )
}

/// Generate a new-chain snapshot from a small pool of roots.
///
/// The pool keeps chain generation cheap and makes same-generation
/// collisions likely.
pub fn chain_snapshot() -> impl Strategy<Value = SyncSnapshot> {
    (
        prop::sample::select(vec!["alpha", "beta", "gamma"]),
        prop::option::of(cursor()),
        prop::option::of(payer_address()),
        prop::option::of(timestamp()),
    )
        .prop_map(|(root, cursor, payer_address, timestamp)| SyncSnapshot {
            chain: Some(generate(root)),
            cursor,
            payer_address,
            timestamp,
        })
}

/// Generate any snapshot, mostly partial ones.
pub fn snapshot() -> impl Strategy<Value = SyncSnapshot> {
    prop_oneof![
        4 => partial_snapshot(),
        1 => chain_snapshot(),
    ]
}
