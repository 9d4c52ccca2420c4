//! Convergence verification between paired devices.
//!
//! Two devices have converged when they hold the same chain, the same
//! cursor and the same address. A fingerprint over those lets a device
//! compare without shipping the whole chain.

use sha2::{Digest as _, Sha256};

use tinypay_otp_core::{ChainState, Digest};

/// Compute a deterministic fingerprint of chain state.
///
/// Returns `None` while no chain is loaded.
///
/// Algorithm: `SHA256("tinypay-state-v0:" || tail || cursor_be || address)`
pub fn state_fingerprint(state: &ChainState) -> Option<Digest> {
    let chain = state.chain()?;

    let mut hasher = Sha256::new();
    hasher.update(b"tinypay-state-v0:");
    hasher.update(chain.tail().as_bytes());
    hasher.update(state.cursor().to_be_bytes());
    hasher.update(state.payer_address().as_bytes());

    Some(Digest::from_bytes(hasher.finalize().into()))
}

/// Result of convergence verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    /// Both devices show the same code for the same address.
    Converged,
    /// Same chain, but cursor or address still differ (may need more sync).
    NotConverged { reason: String },
    /// The devices hold different chain generations.
    DifferentGeneration { local_tail: Digest, remote_tail: Digest },
}

impl ConvergenceResult {
    /// Check if devices have converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged)
    }
}

/// Compare two states.
pub fn verify_convergence(local: &ChainState, remote: &ChainState) -> ConvergenceResult {
    let (local_chain, remote_chain) = match (local.chain(), remote.chain()) {
        (Some(l), Some(r)) => (l, r),
        (None, None) => {
            return ConvergenceResult::NotConverged {
                reason: "no chain on either device".into(),
            }
        }
        (None, Some(_)) => {
            return ConvergenceResult::NotConverged {
                reason: "no chain locally".into(),
            }
        }
        (Some(_), None) => {
            return ConvergenceResult::NotConverged {
                reason: "no chain on remote".into(),
            }
        }
    };

    if local_chain.tail() != remote_chain.tail() {
        return ConvergenceResult::DifferentGeneration {
            local_tail: *local_chain.tail(),
            remote_tail: *remote_chain.tail(),
        };
    }

    if local.cursor() != remote.cursor() {
        return ConvergenceResult::NotConverged {
            reason: format!(
                "cursor mismatch: local={}, remote={}",
                local.cursor(),
                remote.cursor()
            ),
        };
    }

    if local.payer_address() != remote.payer_address() {
        return ConvergenceResult::NotConverged {
            reason: "payer address mismatch".into(),
        };
    }

    ConvergenceResult::Converged
}

/// Compare local state against a peer's fingerprint.
pub fn matches_fingerprint(local: &ChainState, remote: &Digest) -> bool {
    state_fingerprint(local).is_some_and(|f| &f == remote)
}
