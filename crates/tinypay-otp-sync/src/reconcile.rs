//! Merging a peer snapshot into local chain state.
//!
//! Rules, applied in order:
//!
//! 1. A chain from a newer generation replaces everything. Generations are
//!    told apart by tail and, when both sides carry one, by generation
//!    timestamp: re-entering the same root is a new generation even though
//!    the tail repeats. A chain from an older generation is dropped along
//!    with its cursor. A chain from our own generation only contributes its
//!    cursor, by rule 2.
//! 2. A cursor is merged by minimum: codes used on either device stay used.
//! 3. An address is last-write-wins.
//!
//! The reconciler never replies to the sender.

use serde::{Deserialize, Serialize};

use tinypay_otp_core::{Chain, ChainState, Digest, INITIAL_CURSOR};

use crate::messages::SyncSnapshot;

/// Reconciliation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Drop incoming chains generated before the local one.
    pub reject_stale_chains: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            reject_stale_chains: true,
        }
    }
}

/// A locally visible state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// A peer's new chain superseded ours.
    ChainReplaced { tail: Digest, cursor: u16 },
    /// The cursor moved down because the peer used codes.
    CursorAdvanced { from: u16, to: u16 },
    /// The payer address was overwritten.
    AddressChanged { address: String },
}

/// What a reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub changes: Vec<StateChange>,
    /// An incoming chain was ignored as older than the local one.
    pub stale_chain_dropped: bool,
}

impl ReconcileOutcome {
    /// Whether local state was mutated.
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Whether the chain or cursor moved (as opposed to only the address).
    pub fn chain_state_changed(&self) -> bool {
        self.changes
            .iter()
            .any(|c| !matches!(c, StateChange::AddressChanged { .. }))
    }
}

/// Applies peer snapshots to local state.
#[derive(Debug, Clone, Default)]
pub struct SyncReconciler {
    config: ReconcileConfig,
}

impl SyncReconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Merge `snapshot` into `state`.
    ///
    /// Replaying a snapshot that was already applied changes nothing and
    /// reports no changes.
    pub fn reconcile(&self, state: &mut ChainState, snapshot: &SyncSnapshot) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        let mut cursor_consumed = false;

        if let Some(chain) = &snapshot.chain {
            match self.generation_of(state, chain, snapshot.timestamp) {
                Generation::Current => {}
                Generation::Older => {
                    cursor_consumed = true;
                    tracing::debug!(
                        "Ignoring chain generated at {:?}, local chain is from {:?}",
                        snapshot.timestamp,
                        state.generated_at()
                    );
                    outcome.stale_chain_dropped = true;
                }
                Generation::Newer => {
                    let previous_address = state.payer_address().to_string();
                    state.replace(
                        chain.clone(),
                        snapshot.cursor.unwrap_or(INITIAL_CURSOR),
                        snapshot.payer_address.clone(),
                        snapshot.timestamp,
                    );
                    tracing::info!(
                        "Peer chain superseded local chain, cursor now {}",
                        state.cursor()
                    );
                    outcome.changes.push(StateChange::ChainReplaced {
                        tail: *chain.tail(),
                        cursor: state.cursor(),
                    });
                    if state.payer_address() != previous_address {
                        outcome.changes.push(StateChange::AddressChanged {
                            address: state.payer_address().to_string(),
                        });
                    }
                    return outcome;
                }
            }
        }

        if let (Some(incoming), false) = (snapshot.cursor, cursor_consumed) {
            if state.is_ready() {
                let from = state.cursor();
                if state.lower_cursor_to(incoming) {
                    tracing::debug!("Cursor lowered from {} to {}", from, incoming);
                    outcome.changes.push(StateChange::CursorAdvanced { from, to: incoming });
                }
            } else {
                tracing::debug!("Ignoring cursor {} with no chain loaded", incoming);
            }
        }

        if let Some(address) = &snapshot.payer_address {
            if state.set_payer_address(address.as_str()) {
                outcome.changes.push(StateChange::AddressChanged {
                    address: address.clone(),
                });
            }
        }

        outcome
    }

    fn generation_of(&self, state: &ChainState, chain: &Chain, incoming: Option<f64>) -> Generation {
        let Some(local) = state.chain() else {
            return Generation::Newer;
        };
        let stamps = match (incoming, state.generated_at()) {
            (Some(theirs), Some(ours)) => Some((theirs, ours)),
            _ => None,
        };
        let older = self.config.reject_stale_chains && stamps.is_some_and(|(theirs, ours)| theirs < ours);

        if local.tail() == chain.tail() {
            if stamps.is_some_and(|(theirs, ours)| theirs > ours) {
                Generation::Newer
            } else if older {
                Generation::Older
            } else {
                Generation::Current
            }
        } else if older {
            Generation::Older
        } else {
            Generation::Newer
        }
    }
}

/// How an incoming chain relates to the local one.
enum Generation {
    Current,
    Older,
    Newer,
}
