//! The persisted record and its key-value encoding.
//!
//! Both backends store plain `key -> text` entries. This module owns the
//! mapping between those entries and a [`StoredState`].

use std::collections::BTreeMap;

use tinypay_otp_core::{
    chain_from_index_map, chain_to_index_map, Chain, ChainState, INITIAL_CURSOR,
};

use crate::error::{Result, StoreError};

/// Storage keys.
pub mod keys {
    /// Chain as a string-keyed JSON object.
    pub const INDEX_HASH_MAP: &str = "indexHashMap";
    /// Next unused index.
    pub const UNUSED_INDEX: &str = "unusedIndex";
    /// Payer address bound to the chain.
    pub const PAYER_ADDR: &str = "payer_addr";
    /// Generation timestamp of the stored chain.
    pub const LAST_SYNC_TIMESTAMP: &str = "lastSyncTimestamp";
    /// Set once a consumption was attempted past index 0.
    pub const CHAIN_EXHAUSTED: &str = "chainExhausted";
    /// Root secret (opt-in).
    pub const ROOT: &str = "root";

    /// Keys that make up a [`super::StoredState`].
    pub const STATE_KEYS: [&str; 5] = [
        INDEX_HASH_MAP,
        UNUSED_INDEX,
        PAYER_ADDR,
        LAST_SYNC_TIMESTAMP,
        CHAIN_EXHAUSTED,
    ];
}

/// A device's persisted chain state.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredState {
    pub chain: Option<Chain>,
    pub unused_index: u16,
    pub payer_addr: String,
    pub generated_at: Option<f64>,
    pub exhausted: bool,
}

impl StoredState {
    /// Capture a chain state for persistence.
    pub fn from_chain_state(state: &ChainState) -> Self {
        Self {
            chain: state.chain().cloned(),
            unused_index: state.cursor(),
            payer_addr: state.payer_address().to_string(),
            generated_at: state.generated_at(),
            exhausted: state.is_exhausted(),
        }
    }

    /// Rebuild a chain state.
    ///
    /// Without a chain only the address survives; the cursor is meaningless
    /// until a chain arrives.
    pub fn into_chain_state(self) -> ChainState {
        let mut state = ChainState::new();
        match self.chain {
            Some(chain) => {
                state.replace(chain, self.unused_index, Some(self.payer_addr), self.generated_at);
                if self.exhausted {
                    state.mark_exhausted();
                }
            }
            None => {
                state.set_payer_address(self.payer_addr);
            }
        }
        state
    }

    /// Encode as key-value entries. `None` means the key should be removed.
    pub fn to_entries(&self) -> Result<Vec<(&'static str, Option<String>)>> {
        let map = match &self.chain {
            Some(chain) => Some(serde_json::to_string(&chain_to_index_map(chain))?),
            None => None,
        };

        Ok(vec![
            (keys::INDEX_HASH_MAP, map),
            (keys::UNUSED_INDEX, Some(self.unused_index.to_string())),
            (keys::PAYER_ADDR, Some(self.payer_addr.clone())),
            (keys::LAST_SYNC_TIMESTAMP, self.generated_at.map(|t| t.to_string())),
            (keys::CHAIN_EXHAUSTED, self.exhausted.then(|| "true".to_string())),
        ])
    }

    /// Decode from key-value entries.
    ///
    /// Returns `None` when none of the state keys are present. A stored chain
    /// that no longer forms a valid chain is discarded with a warning, the
    /// same way the apps fall back to "no chain" on an unreadable map.
    pub fn from_entries(entries: &BTreeMap<String, String>) -> Result<Option<Self>> {
        if !keys::STATE_KEYS.iter().any(|k| entries.contains_key(*k)) {
            return Ok(None);
        }

        let chain = match entries.get(keys::INDEX_HASH_MAP) {
            Some(json) => decode_chain(json),
            None => None,
        };

        let unused_index = match entries.get(keys::UNUSED_INDEX) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|n| *n <= INITIAL_CURSOR)
                .ok_or_else(|| StoreError::InvalidData {
                    key: keys::UNUSED_INDEX.into(),
                    reason: format!("{raw:?} is not an index in 0..={INITIAL_CURSOR}"),
                })?,
            None => INITIAL_CURSOR,
        };

        let generated_at = match entries.get(keys::LAST_SYNC_TIMESTAMP) {
            Some(raw) => Some(raw.trim().parse::<f64>().map_err(|e| StoreError::InvalidData {
                key: keys::LAST_SYNC_TIMESTAMP.into(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        Ok(Some(Self {
            chain,
            unused_index,
            payer_addr: entries.get(keys::PAYER_ADDR).cloned().unwrap_or_default(),
            generated_at,
            exhausted: entries.get(keys::CHAIN_EXHAUSTED).is_some_and(|v| v == "true"),
        }))
    }
}

fn decode_chain(json: &str) -> Option<Chain> {
    let map: BTreeMap<String, String> = match serde_json::from_str(json) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!("Discarding unreadable {}: {}", keys::INDEX_HASH_MAP, e);
            return None;
        }
    };

    let (chain, dropped) = chain_from_index_map(map.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    for entry in &dropped {
        tracing::warn!("Dropped stored chain entry: {}", entry);
    }
    match chain {
        Ok(chain) => Some(chain),
        Err(e) => {
            tracing::warn!("Discarding stored chain: {}", e);
            None
        }
    }
}
