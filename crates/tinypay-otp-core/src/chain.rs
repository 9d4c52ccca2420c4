//! Hash-chain generation.
//!
//! A chain is 1000 SHA-256 digests derived from a root secret:
//!
//! 1. `chain[0] = H(utf8(root))`
//! 2. `chain[i + 1] = H(hex(chain[i]))` for `i` in `0..=998`
//!
//! Step 2 hashes the 64 ASCII bytes of the lowercase hex rendering, which is
//! what the on-chain verifier recomputes from a presented code.

use crate::digest::Digest;
use crate::error::{CoreError, Result};

/// Number of entries in every chain.
pub const CHAIN_LENGTH: usize = 1000;

/// Index of the tail (the last iterate, registered as the commitment).
pub const TAIL_INDEX: usize = CHAIN_LENGTH - 1;

/// Cursor value after a fresh generation: the entry just before the tail.
pub const INITIAL_CURSOR: u16 = (TAIL_INDEX - 1) as u16;

/// Advance one link: hash the hex text of `prev`.
pub fn step(prev: &Digest) -> Digest {
    Digest::hash(prev.to_hex().as_bytes())
}

/// Generate the full chain for a root secret.
///
/// Pure and deterministic. The 1000 steps are strictly sequential, so callers
/// on an async runtime should run this on a blocking thread.
pub fn generate(root: &str) -> Chain {
    let mut digests = Vec::with_capacity(CHAIN_LENGTH);
    let mut current = Digest::hash(root.as_bytes());
    digests.push(current);

    for _ in 1..CHAIN_LENGTH {
        current = step(&current);
        digests.push(current);
    }

    Chain { digests }
}

/// An immutable 1000-entry OTP chain.
#[derive(Clone, PartialEq, Eq)]
pub struct Chain {
    digests: Vec<Digest>,
}

impl Chain {
    /// Build a chain from externally supplied digests.
    ///
    /// Requires exactly [`CHAIN_LENGTH`] entries where every entry after the
    /// first is the step of its predecessor. The first entry depends on the
    /// root, which is not known here, so it is taken as given.
    pub fn from_digests(digests: Vec<Digest>) -> Result<Self> {
        if digests.len() != CHAIN_LENGTH {
            return Err(CoreError::MalformedChain(format!(
                "expected {} entries, got {}",
                CHAIN_LENGTH,
                digests.len()
            )));
        }

        for (i, pair) in digests.windows(2).enumerate() {
            if step(&pair[0]) != pair[1] {
                return Err(CoreError::MalformedChain(format!(
                    "broken link between index {} and {}",
                    i,
                    i + 1
                )));
            }
        }

        Ok(Self { digests })
    }

    /// Get the digest at `index`.
    pub fn get(&self, index: usize) -> Option<&Digest> {
        self.digests.get(index)
    }

    /// The tail (index 999).
    pub fn tail(&self) -> &Digest {
        &self.digests[TAIL_INDEX]
    }

    /// Number of entries (always [`CHAIN_LENGTH`]).
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// Never true; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Iterate entries from index 0 to the tail.
    pub fn iter(&self) -> impl Iterator<Item = &Digest> {
        self.digests.iter()
    }

    /// Borrow all entries.
    pub fn as_slice(&self) -> &[Digest] {
        &self.digests
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Chain(tail={:?})", self.tail())
    }
}
