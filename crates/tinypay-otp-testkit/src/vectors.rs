//! Golden test vectors for deterministic verification.
//!
//! Any implementation of the chain (phone app, watch app, contract-side
//! verifier) must reproduce these digests exactly.

use serde::Serialize;

use tinypay_otp_core::{generate, Chain, INITIAL_CURSOR, TAIL_INDEX};

/// A golden test vector.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Root secret.
    pub root: &'static str,
    /// Expected `chain[0]` (hex).
    pub head: &'static str,
    /// Expected `chain[1]` (hex).
    pub second: &'static str,
    /// Expected `chain[998]`, the first code shown (hex).
    pub first_code: &'static str,
    /// Expected `chain[999]`, the tail (hex).
    pub tail: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "typical root",
            root: "secret123",
            head: "fcf730b6d95236ecd3c9fc2d92d7b6b2bb061514961aec041d6c7a7192f592e4",
            second: "b2bb19ef0a8d0329f0813d359b7036ff3abd66a12c7ebba761d76b0c2bff2876",
            first_code: "b7b967a63a3a6d58e86387098af5fa6e51af1716e15096dce2bff808d58d2ebb",
            tail: "32bcb7a7cb08c3ec9a35942d7b05c5aa1bdb811a35c530d4a826bfd0d8e71a41",
        },
        GoldenVector {
            name: "single character",
            root: "a",
            head: "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb",
            second: "da3811154d59c4267077ddd8bb768fa9b06399c486e1fc00485116b57c9872f5",
            first_code: "09b15d81e8b972243bbb3d90e6f4bcab4512eaf34f8100bb9a3d2e39315f1ccb",
            tail: "5f00f8a63d95fff6a03890e693afab1568d749e520b44756413cdd833a83df2e",
        },
        GoldenVector {
            name: "root with space",
            root: "TinyPay root",
            head: "089a9a11a3e9fcbef6cf7e325ff8d067a3b4d7da96534a407c41e4f569faedf4",
            second: "0cc95ab80b7296c968b4e300a741fec283f44b96d0759e32c816857de9c5f726",
            first_code: "63a5e410a2a2eea88807fe4cc5b2d4735777af59d2cd2b7ab18398096ab50949",
            tail: "75df22d89b42feb0f54af56838e9a77734a0c35d8dd60fd6219e33da993e5c77",
        },
    ]
}

/// Generate the chain for a vector.
pub fn chain_from_vector(vector: &GoldenVector) -> Chain {
    generate(vector.root)
}

/// Compare a generated chain against a vector.
///
/// Returns the first mismatch as `(label, expected, actual)`.
pub fn check_vector(vector: &GoldenVector) -> Result<(), (&'static str, String, String)> {
    let chain = chain_from_vector(vector);
    let checks = [
        ("chain[0]", 0, vector.head),
        ("chain[1]", 1, vector.second),
        ("chain[998]", INITIAL_CURSOR as usize, vector.first_code),
        ("chain[999]", TAIL_INDEX, vector.tail),
    ];

    for (label, index, expected) in checks {
        let actual = chain.get(index).map(|d| d.to_hex()).unwrap_or_default();
        if actual != expected {
            return Err((label, expected.to_string(), actual));
        }
    }
    Ok(())
}

/// All vectors as pretty JSON, for sharing with other implementations.
pub fn vectors_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}
