//! The string-keyed `{"0": hex, ..., "999": hex}` form of a chain.
//!
//! Both the persisted `indexHashMap` record and the sync payload's `hashDict`
//! use this shape because their formats only allow string keys. Inside the
//! engine a chain is always a [`Chain`]; conversion happens only here.

use std::collections::BTreeMap;

use crate::chain::{Chain, CHAIN_LENGTH};
use crate::digest::Digest;
use crate::error::CoreError;

/// Why an individual index-map entry was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexMapEntryError {
    /// The key is not a canonical base-10 integer (`"7"`, not `"07"` or `" 7"`).
    NonNumericKey(String),
    /// A second entry for an index that was already filled.
    DuplicateIndex(usize),
    /// The key is a number outside `0..=999`.
    KeyOutOfRange(i64),
    /// The value is not a 64-character hex digest.
    BadDigest { index: usize, reason: String },
}

impl std::fmt::Display for IndexMapEntryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonNumericKey(key) => write!(f, "non-numeric index key {key:?}"),
            Self::KeyOutOfRange(n) => write!(f, "index key {n} out of range"),
            Self::DuplicateIndex(i) => write!(f, "duplicate entry for index {i}"),
            Self::BadDigest { index, reason } => write!(f, "bad digest at index {index}: {reason}"),
        }
    }
}

/// Render a chain as a string-keyed map.
pub fn chain_to_index_map(chain: &Chain) -> BTreeMap<String, String> {
    chain
        .iter()
        .enumerate()
        .map(|(i, d)| (i.to_string(), d.to_hex()))
        .collect()
}

/// Rebuild a chain from a string-keyed map.
///
/// Bad entries are dropped one by one and reported in the second tuple
/// element. The chain is returned only if the surviving entries cover every
/// index and link correctly; otherwise the reason is returned as an error.
pub fn chain_from_index_map<'a, I>(
    entries: I,
) -> (Result<Chain, CoreError>, Vec<IndexMapEntryError>)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut slots: Vec<Option<Digest>> = vec![None; CHAIN_LENGTH];
    let mut dropped = Vec::new();

    for (key, value) in entries {
        let index = match key.parse::<i64>() {
            Ok(n) if n.to_string() != key => {
                dropped.push(IndexMapEntryError::NonNumericKey(key.to_string()));
                continue;
            }
            Ok(n) if (0..CHAIN_LENGTH as i64).contains(&n) => n as usize,
            Ok(n) => {
                dropped.push(IndexMapEntryError::KeyOutOfRange(n));
                continue;
            }
            Err(_) => {
                dropped.push(IndexMapEntryError::NonNumericKey(key.to_string()));
                continue;
            }
        };

        if slots[index].is_some() {
            dropped.push(IndexMapEntryError::DuplicateIndex(index));
            continue;
        }

        match Digest::from_hex(value) {
            Ok(digest) => slots[index] = Some(digest),
            Err(e) => dropped.push(IndexMapEntryError::BadDigest {
                index,
                reason: e.to_string(),
            }),
        }
    }

    let missing = slots.iter().filter(|s| s.is_none()).count();
    if missing > 0 {
        let err = CoreError::MalformedChain(format!("{missing} of {CHAIN_LENGTH} indices missing"));
        return (Err(err), dropped);
    }

    let digests = slots.into_iter().flatten().collect();
    (Chain::from_digests(digests), dropped)
}
