//! Shared session storage.
//!
//! A small string key/value store backed by `SQLite`. Every tab in a process
//! shares one [`Storage`] (behind an `Arc`), and every mutation is broadcast
//! to subscribers as a [`StorageEvent`] tagged with the writing tab, so other
//! tabs can react to a login or logout they did not perform.

pub mod migrations;
pub mod schema;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};

/// Default capacity of the change broadcast channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Identity of a tab (one controller instance) writing to shared storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TabId(u64);

impl TabId {
    /// Allocate a process-unique tab id.
    #[must_use]
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

/// Notification that a key in shared storage changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// The key that was written or removed.
    pub key: String,
    /// The tab that performed the write.
    pub source: TabId,
}

/// Key/value storage shared by every tab.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
    /// Change notifications.
    changes: broadcast::Sender<StorageEvent>,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening session storage at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::StorageOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Session storage opened at {}", path.display());
        Ok(Self::from_connection(path, conn))
    }

    /// Create an in-memory storage instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|source| Error::StorageOpen {
            path: path.clone(),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self::from_connection(path, conn))
    }

    fn from_connection(path: PathBuf, conn: Connection) -> Self {
        let (changes, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            path,
            conn: Mutex::new(conn),
            changes,
        }
    }

    /// Replace the change channel with one of the given capacity.
    ///
    /// Existing subscribers stop receiving events, so call this before
    /// handing the storage to any tab.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        self.changes = changes;
        self
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.changes.subscribe()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("session storage lock poisoned"))
    }

    fn notify(&self, key: &str, source: TabId) {
        trace!(key, %source, "storage changed");
        // No receivers is fine; nobody is listening yet.
        let _ = self.changes.send(StorageEvent {
            key: key.to_string(),
            source,
        });
    }

    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM entries WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Write a value on behalf of `source`.
    ///
    /// Subscribers are notified only when the stored value actually changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set(&self, key: &str, value: &str, source: TabId) -> Result<()> {
        let changed = {
            let conn = self.conn()?;
            let previous: Option<String> = conn
                .query_row("SELECT value FROM entries WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?;

            if previous.as_deref() == Some(value) {
                false
            } else {
                conn.execute(
                    r"
                    INSERT INTO entries (key, value, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                   updated_at = excluded.updated_at
                    ",
                    (key, value, Utc::now().to_rfc3339()),
                )?;
                true
            }
        };

        if changed {
            debug!(key, %source, "stored value");
            self.notify(key, source);
        }
        Ok(())
    }

    /// Remove a key on behalf of `source`. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove(&self, key: &str, source: TabId) -> Result<bool> {
        let removed = self.conn()?.execute("DELETE FROM entries WHERE key = ?1", [key])? > 0;

        if removed {
            debug!(key, %source, "removed value");
            self.notify(key, source);
        }
        Ok(removed)
    }

    /// All stored keys in sorted order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn keys(&self) -> Result<Vec<String>> {
        select_keys(&*self.conn()?)
    }

    /// Remove every key, notifying once per removed key. Returns how many were removed.
    ///
    /// The keys are read and deleted under one lock, so a concurrent write
    /// either survives or is reported as removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear(&self, source: TabId) -> Result<usize> {
        let keys = {
            let conn = self.conn()?;
            let keys = select_keys(&conn)?;
            conn.execute("DELETE FROM entries", [])?;
            keys
        };

        for key in &keys {
            self.notify(key, source);
        }
        if !keys.is_empty() {
            info!(count = keys.len(), %source, "cleared session storage");
        }
        Ok(keys.len())
    }
}

fn select_keys(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT key FROM entries ORDER BY key")?;
    let keys = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    #[test]
    fn test_open_in_memory() {
        let storage = create_test_storage();
        assert_eq!(storage.path(), Path::new(":memory:"));
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_open_file_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("session.db");

        let storage = Storage::open(&db_path).unwrap();
        assert_eq!(storage.path(), db_path);
        assert!(db_path.exists());
    }

    #[test]
    fn test_values_persist_across_opens() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("session.db");
        let tab = TabId::new();

        {
            let storage = Storage::open(&db_path).unwrap();
            storage.set("hawa_auth_token", "abc", tab).unwrap();
        }

        let storage = Storage::open(&db_path).unwrap();
        assert_eq!(storage.get("hawa_auth_token").unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_get_missing_key() {
        let storage = create_test_storage();
        assert_eq!(storage.get("nothing").unwrap(), None);
    }

    #[test]
    fn test_set_overwrites() {
        let storage = create_test_storage();
        let tab = TabId::new();

        storage.set("k", "one", tab).unwrap();
        storage.set("k", "two", tab).unwrap();

        assert_eq!(storage.get("k").unwrap().as_deref(), Some("two"));
        assert_eq!(storage.keys().unwrap(), vec!["k".to_string()]);
    }

    #[test]
    fn test_set_notifies_with_source() {
        let storage = create_test_storage();
        let mut rx = storage.subscribe();
        let tab = TabId::new();

        storage.set("hawa_user", "{}", tab).unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.key, "hawa_user");
        assert_eq!(event.source, tab);
    }

    #[test]
    fn test_set_same_value_does_not_notify() {
        let storage = create_test_storage();
        let tab = TabId::new();
        storage.set("k", "v", tab).unwrap();

        let mut rx = storage.subscribe();
        storage.set("k", "v", tab).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_remove() {
        let storage = create_test_storage();
        let tab = TabId::new();
        storage.set("k", "v", tab).unwrap();

        let mut rx = storage.subscribe();
        assert!(storage.remove("k", tab).unwrap());
        assert_eq!(rx.try_recv().unwrap().key, "k");

        assert!(!storage.remove("k", tab).unwrap());
        assert!(rx.try_recv().is_err());
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn test_clear() {
        let storage = create_test_storage();
        let tab = TabId::new();
        storage.set("a", "1", tab).unwrap();
        storage.set("b", "2", tab).unwrap();

        let mut rx = storage.subscribe();
        assert_eq!(storage.clear(tab).unwrap(), 2);
        assert!(storage.keys().unwrap().is_empty());

        let mut keys = vec![rx.try_recv().unwrap().key, rx.try_recv().unwrap().key];
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_clear_reports_every_key_it_deletes() {
        let storage = create_test_storage().with_channel_capacity(1024);
        let mut rx = storage.subscribe();
        let writer = TabId::new();
        let cleaner = TabId::new();
        let keys: Vec<String> = (0..200).map(|i| format!("k{i:03}")).collect();

        std::thread::scope(|scope| {
            let handle = scope.spawn(|| {
                for key in &keys {
                    storage.set(key, "v", writer).unwrap();
                }
            });
            while !handle.is_finished() {
                storage.clear(cleaner).unwrap();
            }
        });

        let mut events = std::collections::HashMap::<String, usize>::new();
        while let Ok(event) = rx.try_recv() {
            *events.entry(event.key).or_default() += 1;
        }

        // One event for the write, plus one more if a clear removed it.
        for key in &keys {
            let expected = if storage.get(key).unwrap().is_some() { 1 } else { 2 };
            assert_eq!(events.get(key).copied(), Some(expected), "{key}");
        }
    }

    #[test]
    fn test_keys_sorted() {
        let storage = create_test_storage();
        let tab = TabId::new();
        storage.set("zeta", "1", tab).unwrap();
        storage.set("alpha", "2", tab).unwrap();

        assert_eq!(
            storage.keys().unwrap(),
            vec!["alpha".to_string(), "zeta".to_string()]
        );
    }

    #[test]
    fn test_with_channel_capacity_zero_is_clamped() {
        let storage = create_test_storage().with_channel_capacity(0);
        let mut rx = storage.subscribe();
        storage.set("k", "v", TabId::new()).unwrap();
        assert_eq!(rx.try_recv().unwrap().key, "k");
    }

    #[test]
    fn test_tab_ids_are_unique() {
        let a = TabId::new();
        let b = TabId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("tab-"));
    }
}
