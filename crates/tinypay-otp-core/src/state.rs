//! Chain state: the chain, its consumption cursor, and the bound payer address.
//!
//! The cursor starts at [`INITIAL_CURSOR`] and only moves down between
//! generations. Index 0 is the last usable code; attempting to consume past
//! it marks the state exhausted until a new chain is installed.

use crate::chain::{Chain, INITIAL_CURSOR};
use crate::code::PaymentCode;
use crate::digest::Digest;
use crate::error::{CoreError, Result};

/// The code currently on display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentCode {
    /// Chain index of the code.
    pub index: u16,
    /// The OTP digest at that index.
    pub digest: Digest,
    /// Payer address presented alongside the OTP.
    pub payer_address: String,
}

impl CurrentCode {
    /// The `addr:<address> otp:0x<digest>` payment code for this entry.
    pub fn payment_code(&self) -> PaymentCode {
        PaymentCode {
            payer_address: self.payer_address.clone(),
            digest: self.digest,
        }
    }
}

/// OTP chain state owned by one device.
///
/// Mutated only by local consumption, by reconciliation against a peer
/// snapshot, or wholesale by installing a new chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainState {
    chain: Option<Chain>,
    cursor: u16,
    payer_address: String,
    generated_at: Option<f64>,
    exhausted: bool,
}

impl Default for ChainState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainState {
    /// Empty state: no chain, cursor at its initial value, no address.
    pub fn new() -> Self {
        Self {
            chain: None,
            cursor: INITIAL_CURSOR,
            payer_address: String::new(),
            generated_at: None,
            exhausted: false,
        }
    }

    /// Install a freshly generated chain.
    ///
    /// Chain and address are replaced together and the cursor is reset to
    /// [`INITIAL_CURSOR`] whatever its previous value.
    pub fn initialize(&mut self, chain: Chain, payer_address: impl Into<String>, generated_at: f64) {
        self.replace(chain, INITIAL_CURSOR, Some(payer_address.into()), Some(generated_at));
    }

    /// Install a chain with an explicit cursor.
    ///
    /// Used when a peer's new generation supersedes ours and when restoring
    /// persisted state. Cursors above [`INITIAL_CURSOR`] are clamped. A
    /// `None` address keeps the current one.
    pub fn replace(
        &mut self,
        chain: Chain,
        cursor: u16,
        payer_address: Option<String>,
        generated_at: Option<f64>,
    ) {
        self.chain = Some(chain);
        self.cursor = cursor.min(INITIAL_CURSOR);
        if let Some(address) = payer_address {
            self.payer_address = address;
        }
        self.generated_at = generated_at;
        self.exhausted = false;
    }

    /// The code that should be shown now.
    pub fn current_code(&self) -> Result<CurrentCode> {
        let chain = self.chain.as_ref().ok_or(CoreError::NotReady)?;
        if self.payer_address.is_empty() {
            return Err(CoreError::AddressMissing);
        }
        if self.exhausted {
            return Err(CoreError::IndexExhausted);
        }

        let digest = *chain
            .get(self.cursor as usize)
            .ok_or(CoreError::IndexExhausted)?;

        Ok(CurrentCode {
            index: self.cursor,
            digest,
            payer_address: self.payer_address.clone(),
        })
    }

    /// Mark the current code as used and move to the next one.
    ///
    /// Returns the new cursor. At cursor 0 nothing moves: the state is
    /// flagged exhausted and [`CoreError::AlreadyExhausted`] is returned.
    pub fn consume_one(&mut self) -> Result<u16> {
        if self.chain.is_none() {
            return Err(CoreError::NotReady);
        }
        if self.cursor == 0 {
            self.exhausted = true;
            return Err(CoreError::AlreadyExhausted);
        }
        self.cursor -= 1;
        Ok(self.cursor)
    }

    /// Restore a persisted exhausted flag. Only meaningful at cursor 0 with
    /// a chain loaded; returns whether the flag was set.
    pub fn mark_exhausted(&mut self) -> bool {
        if self.chain.is_some() && self.cursor == 0 {
            self.exhausted = true;
        }
        self.exhausted
    }

    /// Lower the cursor to `target` if that is strictly below the current
    /// value. Never raises it. Returns whether the cursor moved.
    pub fn lower_cursor_to(&mut self, target: u16) -> bool {
        if target < self.cursor {
            self.cursor = target;
            true
        } else {
            false
        }
    }

    /// Overwrite the payer address. Returns whether the value changed.
    pub fn set_payer_address(&mut self, address: impl Into<String>) -> bool {
        let address = address.into();
        if self.payer_address == address {
            return false;
        }
        self.payer_address = address;
        true
    }

    /// The loaded chain, if any.
    pub fn chain(&self) -> Option<&Chain> {
        self.chain.as_ref()
    }

    /// Whether a chain is loaded.
    pub fn is_ready(&self) -> bool {
        self.chain.is_some()
    }

    /// The next-unused index.
    pub fn cursor(&self) -> u16 {
        self.cursor
    }

    /// The bound payer address (may be empty).
    pub fn payer_address(&self) -> &str {
        &self.payer_address
    }

    /// When the current chain was generated (seconds since Unix epoch).
    pub fn generated_at(&self) -> Option<f64> {
        self.generated_at
    }

    /// Whether consumption has run past index 0.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Number of codes still available, counting the one on display.
    pub fn remaining(&self) -> usize {
        match (&self.chain, self.exhausted) {
            (None, _) | (Some(_), true) => 0,
            (Some(_), false) => self.cursor as usize + 1,
        }
    }
}
