//! Sync snapshots and their wire form.
//!
//! Devices exchange an application context: a flat JSON object whose keys
//! are a subset of
//!
//! ```text
//! { "hashDict":    { "0": "<hex64>", ..., "999": "<hex64>" },
//!   "unusedIndex": <int>,
//!   "payer_addr":  "<string>",
//!   "timestamp":   <seconds since epoch> }
//! ```
//!
//! The presence of `hashDict` means "new chain". Decoding is lenient: each
//! bad entry is dropped and reported, the rest still applies.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use tinypay_otp_core::{chain_from_index_map, chain_to_index_map, Chain, ChainState, INITIAL_CURSOR};

use crate::error::{Result, SyncError};

/// Wire keys.
pub mod wire_keys {
    /// Full chain as a string-keyed object.
    pub const HASH_DICT: &str = "hashDict";
    /// Sender's next unused index.
    pub const UNUSED_INDEX: &str = "unusedIndex";
    /// Payer address.
    pub const PAYER_ADDR: &str = "payer_addr";
    /// Generation timestamp of the accompanying chain.
    pub const TIMESTAMP: &str = "timestamp";
}

/// A partial view of a peer's state.
///
/// `chain` present means the sender computed a new chain. Without it the
/// snapshot is an index-only and/or address-only update.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncSnapshot {
    pub chain: Option<Chain>,
    pub cursor: Option<u16>,
    pub payer_address: Option<String>,
    pub timestamp: Option<f64>,
}

impl SyncSnapshot {
    /// Everything: chain, cursor, address and generation timestamp.
    ///
    /// An empty address is left out so it cannot overwrite the peer's.
    pub fn full(state: &ChainState) -> Self {
        Self {
            chain: state.chain().cloned(),
            cursor: Some(state.cursor()),
            payer_address: non_empty(state.payer_address()),
            timestamp: state.generated_at(),
        }
    }

    /// Cursor only.
    pub fn index(state: &ChainState) -> Self {
        Self {
            cursor: Some(state.cursor()),
            ..Self::default()
        }
    }

    /// Address only.
    pub fn address(payer_address: impl Into<String>) -> Self {
        Self {
            payer_address: Some(payer_address.into()),
            ..Self::default()
        }
    }

    /// Whether the snapshot carries anything reconcilable.
    pub fn is_empty(&self) -> bool {
        self.chain.is_none() && self.cursor.is_none() && self.payer_address.is_none()
    }

    /// Encode for the wire.
    pub fn to_context(&self) -> ApplicationContext {
        let mut map = Map::new();
        if let Some(chain) = &self.chain {
            let dict = chain_to_index_map(chain)
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            map.insert(wire_keys::HASH_DICT.into(), Value::Object(dict));
        }
        if let Some(cursor) = self.cursor {
            map.insert(wire_keys::UNUSED_INDEX.into(), Value::from(cursor));
        }
        if let Some(address) = &self.payer_address {
            map.insert(wire_keys::PAYER_ADDR.into(), Value::String(address.clone()));
        }
        if let Some(number) = self.timestamp.and_then(Number::from_f64) {
            map.insert(wire_keys::TIMESTAMP.into(), Value::Number(number));
        }
        ApplicationContext(map)
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// One payload entry that was dropped during decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEntry {
    pub key: String,
    pub reason: String,
}

impl MalformedEntry {
    fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for MalformedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.reason)
    }
}

/// The raw key-value payload carried by a transport.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationContext(Map<String, Value>);

impl ApplicationContext {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(SyncError::InvalidMessage(format!(
                "expected a JSON object, got {}",
                kind_of(&other)
            ))),
            Err(e) => Err(SyncError::InvalidMessage(e.to_string())),
        }
    }

    /// Render as a JSON object.
    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode into a snapshot, dropping bad entries.
    ///
    /// Every dropped entry is logged at `warn` and returned alongside the
    /// snapshot. When `hashDict` is present but unusable, `unusedIndex` and
    /// `timestamp` are dropped with it since they describe that chain.
    pub fn decode(&self) -> (SyncSnapshot, Vec<MalformedEntry>) {
        let mut snapshot = SyncSnapshot::default();
        let mut malformed = Vec::new();
        let mut chain_rejected = false;

        if let Some(value) = self.0.get(wire_keys::HASH_DICT) {
            match decode_hash_dict(value, &mut malformed) {
                Some(chain) => snapshot.chain = Some(chain),
                None => chain_rejected = true,
            }
        }

        if let Some(value) = self.0.get(wire_keys::UNUSED_INDEX) {
            if chain_rejected {
                malformed.push(MalformedEntry::new(
                    wire_keys::UNUSED_INDEX,
                    "dropped with the unusable hashDict",
                ));
            } else {
                match decode_index(value) {
                    Ok(index) => snapshot.cursor = Some(index),
                    Err(reason) => malformed.push(MalformedEntry::new(wire_keys::UNUSED_INDEX, reason)),
                }
            }
        }

        if let Some(value) = self.0.get(wire_keys::PAYER_ADDR) {
            match value {
                Value::String(s) => snapshot.payer_address = Some(s.clone()),
                other => malformed.push(MalformedEntry::new(
                    wire_keys::PAYER_ADDR,
                    format!("expected a string, got {}", kind_of(other)),
                )),
            }
        }

        if let Some(value) = self.0.get(wire_keys::TIMESTAMP) {
            match value.as_f64() {
                Some(_) if chain_rejected => {}
                Some(t) => snapshot.timestamp = Some(t),
                None => malformed.push(MalformedEntry::new(
                    wire_keys::TIMESTAMP,
                    format!("expected a number, got {}", kind_of(value)),
                )),
            }
        }

        for entry in &malformed {
            tracing::warn!("Dropped sync entry {}", entry);
        }

        (snapshot, malformed)
    }
}

impl From<&SyncSnapshot> for ApplicationContext {
    fn from(snapshot: &SyncSnapshot) -> Self {
        snapshot.to_context()
    }
}

fn decode_hash_dict(value: &Value, malformed: &mut Vec<MalformedEntry>) -> Option<Chain> {
    let dict = match value {
        Value::Object(dict) => dict,
        other => {
            malformed.push(MalformedEntry::new(
                wire_keys::HASH_DICT,
                format!("expected an object, got {}", kind_of(other)),
            ));
            return None;
        }
    };

    let mut entries = Vec::with_capacity(dict.len());
    for (key, digest) in dict {
        match digest {
            Value::String(hex) => entries.push((key.as_str(), hex.as_str())),
            other => malformed.push(MalformedEntry::new(
                format!("{}[{}]", wire_keys::HASH_DICT, key),
                format!("expected a hex string, got {}", kind_of(other)),
            )),
        }
    }

    let (chain, dropped) = chain_from_index_map(entries);
    malformed.extend(
        dropped
            .into_iter()
            .map(|e| MalformedEntry::new(wire_keys::HASH_DICT, e.to_string())),
    );

    match chain {
        Ok(chain) => Some(chain),
        Err(e) => {
            malformed.push(MalformedEntry::new(wire_keys::HASH_DICT, e.to_string()));
            None
        }
    }
}

fn decode_index(value: &Value) -> std::result::Result<u16, String> {
    let n = match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => f as i64,
            _ => return Err(format!("{n} is not an integer")),
        },
        other => return Err(format!("expected an integer, got {}", kind_of(other))),
    };

    if (0..=INITIAL_CURSOR as i64).contains(&n) {
        Ok(n as u16)
    } else {
        Err(format!("{n} outside 0..={INITIAL_CURSOR}"))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
