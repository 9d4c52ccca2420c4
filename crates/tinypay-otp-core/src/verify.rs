//! Counterparty-side OTP verification.
//!
//! A verifier holds a commitment: the tail registered at deposit time, or the
//! last code it accepted. A presented code is genuine if hashing it forward
//! reaches the commitment. Codes are handed out from high index to low, so a
//! fresh code sits one or more steps before the commitment.

use crate::chain::step;
use crate::digest::Digest;

/// Check that `commitment` is exactly one step after `otp`.
pub fn verify_step(otp: &Digest, commitment: &Digest) -> bool {
    &step(otp) == commitment
}

/// Count the forward steps from `otp` to `commitment`.
///
/// Returns `Some(n)` for the smallest `n` in `1..=max_steps` with
/// `step^n(otp) == commitment`, or `None` if the commitment is not reached.
/// A code equal to the commitment itself is a replay and yields `None`.
pub fn steps_to_commitment(otp: &Digest, commitment: &Digest, max_steps: usize) -> Option<usize> {
    let mut current = *otp;
    for n in 1..=max_steps {
        current = step(&current);
        if &current == commitment {
            return Some(n);
        }
    }
    None
}
