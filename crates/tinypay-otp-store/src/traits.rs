//! StateStore trait: the abstract interface for chain-state persistence.
//!
//! This trait keeps devices storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;

use crate::error::Result;
use crate::record::StoredState;

/// Async interface for persisting one device's OTP state.
///
/// # Design Notes
///
/// - **Atomic saves**: `save_state` writes chain, cursor, and address together;
///   readers never observe a new chain with an old address.
/// - **Cheap cursor path**: `save_cursor` rewrites only `unusedIndex`, which is
///   all a local consumption changes.
/// - **Root is separate**: the root secret is never part of [`StoredState`]
///   and is only written through `save_root`.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the persisted state, or `None` if nothing was ever saved.
    async fn load_state(&self) -> Result<Option<StoredState>>;

    /// Persist the full state atomically.
    async fn save_state(&self, state: &StoredState) -> Result<()>;

    /// Persist only the cursor.
    async fn save_cursor(&self, unused_index: u16) -> Result<()>;

    /// Persist the root secret.
    async fn save_root(&self, root: &str) -> Result<()>;

    /// Load the root secret, if one was persisted.
    async fn load_root(&self) -> Result<Option<String>>;

    /// Remove the root secret.
    async fn clear_root(&self) -> Result<()>;

    /// Remove everything.
    async fn clear(&self) -> Result<()>;
}

#[async_trait]
impl<S: StateStore + ?Sized> StateStore for std::sync::Arc<S> {
    async fn load_state(&self) -> Result<Option<StoredState>> {
        (**self).load_state().await
    }

    async fn save_state(&self, state: &StoredState) -> Result<()> {
        (**self).save_state(state).await
    }

    async fn save_cursor(&self, unused_index: u16) -> Result<()> {
        (**self).save_cursor(unused_index).await
    }

    async fn save_root(&self, root: &str) -> Result<()> {
        (**self).save_root(root).await
    }

    async fn load_root(&self) -> Result<Option<String>> {
        (**self).load_root().await
    }

    async fn clear_root(&self) -> Result<()> {
        (**self).clear_root().await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }
}
