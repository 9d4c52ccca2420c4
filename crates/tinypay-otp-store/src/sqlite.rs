//! SQLite implementation of the StateStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::record::{keys, StoredState};
use crate::traits::StateStore;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(format!("connection mutex: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn put(conn: &Connection, key: &str, value: &str, now: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, now],
    )
}

fn get(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM kv_entries WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

fn delete(conn: &Connection, key: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn load_state(&self) -> Result<Option<StoredState>> {
        self.blocking(|conn| {
            let mut entries = BTreeMap::new();
            for key in keys::STATE_KEYS {
                if let Some(value) = get(conn, key)? {
                    entries.insert(key.to_string(), value);
                }
            }
            StoredState::from_entries(&entries)
        })
        .await
    }

    async fn save_state(&self, state: &StoredState) -> Result<()> {
        let updates = state.to_entries()?;

        self.blocking(move |conn| {
            let now = now_millis();
            let tx = conn.transaction()?;
            for (key, value) in &updates {
                match value {
                    Some(v) => put(&tx, key, v, now)?,
                    None => delete(&tx, key)?,
                };
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn save_cursor(&self, unused_index: u16) -> Result<()> {
        self.blocking(move |conn| {
            put(conn, keys::UNUSED_INDEX, &unused_index.to_string(), now_millis())?;
            Ok(())
        })
        .await
    }

    async fn save_root(&self, root: &str) -> Result<()> {
        let root = root.to_string();
        self.blocking(move |conn| {
            put(conn, keys::ROOT, &root, now_millis())?;
            Ok(())
        })
        .await
    }

    async fn load_root(&self) -> Result<Option<String>> {
        self.blocking(|conn| Ok(get(conn, keys::ROOT)?)).await
    }

    async fn clear_root(&self) -> Result<()> {
        self.blocking(|conn| {
            delete(conn, keys::ROOT)?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.blocking(|conn| {
            conn.execute("DELETE FROM kv_entries", [])?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinypay_otp_core::generate;

    fn sample_state() -> StoredState {
        StoredState {
            chain: Some(generate("sqlite")),
            unused_index: 998,
            payer_addr: "0xsqlite".into(),
            generated_at: Some(1_700_000_000.0),
            exhausted: false,
        }
    }

    #[tokio::test]
    async fn test_save_and_load_state() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.load_state().await.unwrap().is_none());

        let state = sample_state();
        store.save_state(&state).await.unwrap();
        assert_eq!(store.load_state().await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn test_save_cursor() {
        let store = SqliteStore::open_memory().unwrap();
        store.save_state(&sample_state()).await.unwrap();
        store.save_cursor(17).await.unwrap();
        assert_eq!(store.load_state().await.unwrap().unwrap().unused_index, 17);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_chain() {
        let store = SqliteStore::open_memory().unwrap();
        store.save_state(&sample_state()).await.unwrap();

        let mut next = sample_state();
        next.chain = Some(generate("rotated"));
        next.unused_index = 998;
        store.save_state(&next).await.unwrap();

        let loaded = store.load_state().await.unwrap().unwrap();
        assert_eq!(loaded.chain, Some(generate("rotated")));
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_state(&sample_state()).await.unwrap();
            store.save_cursor(400).await.unwrap();
            store.save_root("secret").await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.load_state().await.unwrap().unwrap();
        assert_eq!(loaded.unused_index, 400);
        assert_eq!(loaded.payer_addr, "0xsqlite");
        assert_eq!(store.load_root().await.unwrap().as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_clear() {
        let store = SqliteStore::open_memory().unwrap();
        store.save_state(&sample_state()).await.unwrap();
        store.save_root("secret").await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load_state().await.unwrap().is_none());
        assert!(store.load_root().await.unwrap().is_none());
    }
}
