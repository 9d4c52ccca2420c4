//! In-memory implementation of the StateStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::record::{keys, StoredState};
use crate::traits::StateStore;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a raw entry (for inspection in tests).
    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_state(&self) -> Result<Option<StoredState>> {
        let entries = self.read()?;
        StoredState::from_entries(&entries)
    }

    async fn save_state(&self, state: &StoredState) -> Result<()> {
        let updates = state.to_entries()?;
        let mut entries = self.write()?;
        for (key, value) in updates {
            match value {
                Some(v) => entries.insert(key.to_string(), v),
                None => entries.remove(key),
            };
        }
        Ok(())
    }

    async fn save_cursor(&self, unused_index: u16) -> Result<()> {
        self.write()?
            .insert(keys::UNUSED_INDEX.to_string(), unused_index.to_string());
        Ok(())
    }

    async fn save_root(&self, root: &str) -> Result<()> {
        self.write()?.insert(keys::ROOT.to_string(), root.to_string());
        Ok(())
    }

    async fn load_root(&self) -> Result<Option<String>> {
        self.get_raw(keys::ROOT)
    }

    async fn clear_root(&self) -> Result<()> {
        self.write()?.remove(keys::ROOT);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }
}
