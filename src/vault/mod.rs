//! Vault Module
//!
//! A named, persistent mapping backed by one SQLite file.
//!
//! ## Responsibilities
//! - Resolve a vault name to its backing file and open or create it
//! - Run every public operation as one transaction
//! - Serialize callers on the vault's connection
//! - Track the open/closed lifecycle (`delete_vault`, `close`)
//!
//! ## Lifecycle
//! ```text
//!   open ──► OPEN ──► delete_vault / close ──► CLOSED
//!              ▲                                  │
//!              └──────── open (new handle) ◄──────┘
//! ```
//! Every operation on a CLOSED vault fails with `VaultError::Closed`.

mod iter;
mod session;

pub use iter::Keys;
pub use session::Session;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rusqlite::{Connection, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{self, Config};
use crate::error::{Result, VaultError};
use crate::storage::{self, Table};

/// How a vault is opened
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    create_if_missing: bool,
    thread_safe: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            thread_safe: true,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the backing file when it does not exist (default: true)
    pub fn create_if_missing(mut self, yes: bool) -> Self {
        self.create_if_missing = yes;
        self
    }

    /// Block on contention instead of failing with `Busy` (default: true)
    pub fn thread_safe(mut self, yes: bool) -> Self {
        self.thread_safe = yes;
        self
    }
}

type ConnSlot = RefCell<Option<Connection>>;

/// A persistent key/value mapping
///
/// ## Concurrency Model: one connection, one caller at a time
///
/// - The connection sits behind a re-entrant mutex; each operation holds it
///   for exactly one transaction.
/// - **thread_safe = true**: callers block until the connection is free.
/// - **thread_safe = false**: a caller that finds it taken gets `Busy`
///   instead of waiting.
/// - Calling back into the same vault from inside `with_session` would
///   need a second transaction on the same connection and fails with `Busy`.
///
/// Other processes sharing the file are arbitrated by SQLite's own file
/// locking (see `Config::busy_timeout_ms`).
pub struct Vault {
    /// Vault name, also the file stem
    name: String,

    /// Backing database file
    path: PathBuf,

    /// Blocking (true) or fail-fast (false) acquisition
    thread_safe: bool,

    /// Keys fetched per page by `iter`
    page_size: usize,

    /// Cleared by `delete_vault` / `close`
    open: AtomicBool,

    /// `None` once the vault is CLOSED
    conn: ReentrantMutex<ConnSlot>,
}

impl Vault {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open (or create) `name` under the process-wide configuration
    pub fn open(name: &str) -> Result<Self> {
        Self::open_with(name, OpenOptions::default())
    }

    /// Open `name` under the process-wide configuration with explicit options
    pub fn open_with(name: &str, options: OpenOptions) -> Result<Self> {
        Self::open_in(&config::global(), name, options)
    }

    /// Open `name` under an explicit configuration
    ///
    /// On open:
    /// 1. Resolve `<root>/<vaults>/<name>.<ext>`
    /// 2. Refuse a missing file unless `create_if_missing`
    /// 3. Open the connection and ensure the relation exists
    pub fn open_in(config: &Config, name: &str, options: OpenOptions) -> Result<Self> {
        // Step 1: Resolve the backing file
        let path = config.vault_path(name)?;
        let existed = path.exists();

        // Step 2: Missing file without permission to create it
        if !existed && !options.create_if_missing {
            tracing::error!(vault = %name, path = %path.display(), "No such vault");
            return Err(VaultError::NotFound {
                name: name.to_string(),
            });
        }

        // Step 3: Connect and bootstrap
        fs::create_dir_all(config.vaults_dir())?;
        let conn = storage::open_connection(&path, options.create_if_missing)?;
        storage::configure_connection(&conn, config.busy_timeout_ms)?;
        storage::ensure_schema(&conn)?;

        if existed {
            tracing::debug!(vault = %name, path = %path.display(), "Vault opened");
        } else {
            tracing::info!(vault = %name, path = %path.display(), "Vault created");
        }

        Ok(Self {
            name: name.to_string(),
            path,
            thread_safe: options.thread_safe,
            page_size: config.page_size.max(1),
            open: AtomicBool::new(true),
            conn: ReentrantMutex::new(RefCell::new(Some(conn))),
        })
    }

    /// Remove every entry and the backing file; the vault becomes CLOSED
    ///
    /// Removing a file that is already gone is not an error. A connection
    /// that fails to close is logged and dropped, and the file is still
    /// removed.
    pub fn delete_vault(&self) -> Result<()> {
        self.delete_vault_with(Connection::close)
    }

    fn delete_vault_with<F>(&self, close: F) -> Result<()>
    where
        F: FnOnce(Connection) -> std::result::Result<(), (Connection, rusqlite::Error)>,
    {
        let conn = self.detach()?;
        if let Err((conn, e)) = close(conn) {
            tracing::warn!(vault = %self.name, error = %e, "Connection did not close cleanly, dropping it");
            drop(conn);
        }

        if storage::remove_backing_file(&self.path)? {
            tracing::info!(vault = %self.name, path = %self.path.display(), "Vault deleted");
        } else {
            tracing::warn!(vault = %self.name, path = %self.path.display(), "Vault file already gone");
        }
        Ok(())
    }

    /// Release the connection, keeping the file
    pub fn close(self) -> Result<()> {
        let conn = self.detach()?;
        conn.close().map_err(|(_, e)| VaultError::from(e))?;
        tracing::debug!(vault = %self.name, "Vault closed");
        Ok(())
    }

    /// Take the connection out of its slot; the vault is CLOSED afterwards
    fn detach(&self) -> Result<Connection> {
        let guard = self.acquire()?;
        let mut slot = guard.try_borrow_mut().map_err(|_| VaultError::Busy)?;
        let conn = slot.take().ok_or_else(|| self.closed())?;
        self.open.store(false, Ordering::Release);
        Ok(conn)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn is_thread_safe(&self) -> bool {
        self.thread_safe
    }

    pub(crate) fn page_size(&self) -> usize {
        self.page_size
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Run `f` as one transaction
    ///
    /// Commits when `f` returns `Ok`; rolls back when it returns `Err` or
    /// panics. Nothing else can use the vault while `f` runs.
    pub fn with_session<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Session<'_>) -> Result<R>,
    {
        self.run(TransactionBehavior::Immediate, f)
    }

    fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Session<'_>) -> Result<R>,
    {
        self.run(TransactionBehavior::Deferred, f)
    }

    fn run<R, F>(&self, behavior: TransactionBehavior, f: F) -> Result<R>
    where
        F: FnOnce(&Session<'_>) -> Result<R>,
    {
        let guard = self.acquire()?;
        let mut slot = guard.try_borrow_mut().map_err(|_| VaultError::Busy)?;
        let conn = slot.as_mut().ok_or_else(|| self.closed())?;

        let tx = conn.transaction_with_behavior(behavior)?;
        let outcome = f(&Session::new(Table::new(&tx), &self.name));
        match outcome {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!(vault = %self.name, error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    fn acquire(&self) -> Result<ReentrantMutexGuard<'_, ConnSlot>> {
        if self.thread_safe {
            Ok(self.conn.lock())
        } else {
            self.conn.try_lock().ok_or(VaultError::Busy)
        }
    }

    fn closed(&self) -> VaultError {
        VaultError::Closed {
            name: self.name.clone(),
        }
    }

    // =========================================================================
    // Single-item operations
    // =========================================================================

    /// Store `value` under `key`, replacing any previous value
    pub fn put<K, V>(&self, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        self.with_session(|s| s.put(key, value))
    }

    /// Value under `key`, or `None` when absent
    pub fn get<K, V>(&self, key: &K) -> Result<Option<V>>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        self.read(|s| s.get(key))
    }

    pub fn get_or<K, V>(&self, key: &K, default: V) -> Result<V>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        self.read(|s| s.get_or(key, default))
    }

    /// Value under `key`; `MissingKey` when absent
    pub fn item<K, V>(&self, key: &K) -> Result<V>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        self.read(|s| s.item(key))
    }

    pub fn has<K: Serialize + ?Sized>(&self, key: &K) -> Result<bool> {
        self.read(|s| s.has(key))
    }

    pub fn contains_key<K: Serialize + ?Sized>(&self, key: &K) -> Result<bool> {
        self.has(key)
    }

    /// Remove `key`; `MissingKey` when absent
    pub fn delete<K: Serialize + ?Sized>(&self, key: &K) -> Result<()> {
        self.with_session(|s| s.delete(key))
    }

    /// Remove `key` and return its value; `MissingKey` when absent
    pub fn pop<K, V>(&self, key: &K) -> Result<V>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        self.with_session(|s| s.pop(key))
    }

    /// Remove and return an arbitrary entry; `EmptyStore` when empty
    pub fn pop_item<K, V>(&self) -> Result<(K, V)>
    where
        K: DeserializeOwned,
        V: DeserializeOwned,
    {
        self.with_session(|s| s.pop_item())
    }

    /// Existing value under `key`, or store `default` and return it
    pub fn setdefault<K, V>(&self, key: &K, default: V) -> Result<V>
    where
        K: Serialize + ?Sized,
        V: Serialize + DeserializeOwned,
    {
        self.with_session(|s| s.setdefault(key, default))
    }

    // =========================================================================
    // Bulk operations (all-or-nothing)
    // =========================================================================

    /// Store every pair in one transaction; returns how many were written
    pub fn put_many<K, V, I>(&self, entries: I) -> Result<usize>
    where
        K: Serialize,
        V: Serialize,
        I: IntoIterator<Item = (K, V)>,
    {
        self.with_session(|s| s.put_many(entries))
    }

    /// Values for the keys that are present
    pub fn get_many<K, V, I>(&self, keys: I) -> Result<HashMap<K, V>>
    where
        K: Serialize + Eq + Hash,
        V: DeserializeOwned,
        I: IntoIterator<Item = K>,
    {
        self.read(|s| s.get_many(keys))
    }

    /// Remove the keys that are present and return their values
    pub fn pop_many<K, V, I>(&self, keys: I) -> Result<HashMap<K, V>>
    where
        K: Serialize + Eq + Hash,
        V: DeserializeOwned,
        I: IntoIterator<Item = K>,
    {
        self.with_session(|s| s.pop_many(keys))
    }

    /// True iff every key is present
    pub fn has_keys<K, I>(&self, keys: I) -> Result<bool>
    where
        K: Serialize,
        I: IntoIterator<Item = K>,
    {
        self.read(|s| s.has_keys(keys))
    }

    /// Copy every entry of `other` into this vault, overwriting shared keys
    ///
    /// Records are copied as stored, so values written with the fallback
    /// format survive without knowing their type.
    pub fn update(&self, other: &Vault) -> Result<usize> {
        if std::ptr::eq(self, other) {
            return self.len();
        }
        let entries = other.read(|s| s.raw_entries())?;
        self.with_session(|s| {
            for (key, record) in &entries {
                s.put_raw(key, record)?;
            }
            Ok(entries.len())
        })
    }

    // =========================================================================
    // Whole-vault operations
    // =========================================================================

    /// Remove every entry, keeping the vault open
    pub fn clear(&self) -> Result<()> {
        self.with_session(|s| s.clear())
    }

    pub fn len(&self) -> Result<usize> {
        self.read(|s| s.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.read(|s| s.is_empty())
    }

    /// Truthiness of the mapping: true iff it holds at least one entry
    pub fn is_nonempty(&self) -> Result<bool> {
        Ok(!self.is_empty()?)
    }

    /// Snapshot of every key
    pub fn keys<K: DeserializeOwned>(&self) -> Result<Vec<K>> {
        self.read(|s| s.keys())
    }

    /// Snapshot of every value
    pub fn values<V: DeserializeOwned>(&self) -> Result<Vec<V>> {
        self.read(|s| s.values())
    }

    /// Snapshot of every entry
    pub fn items<K, V>(&self) -> Result<Vec<(K, V)>>
    where
        K: DeserializeOwned,
        V: DeserializeOwned,
    {
        self.read(|s| s.items())
    }

    /// Lazily iterate over keys, one page per transaction
    pub fn iter<K: DeserializeOwned>(&self) -> Keys<'_, K> {
        Keys::new(self)
    }

    pub(crate) fn keys_page(&self, after: Option<&[u8]>, limit: usize) -> Result<Vec<Vec<u8>>> {
        self.read(|s| s.table().keys_after(after, limit))
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("thread_safe", &self.thread_safe)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_temp_vault(name: &str) -> (TempDir, Config, Vault) {
        let temp = TempDir::new().unwrap();
        let config = Config::builder().root_dir(temp.path()).page_size(2).build();
        let vault = Vault::open_in(&config, name, OpenOptions::default()).unwrap();
        (temp, config, vault)
    }

    #[test]
    fn test_open_creates_file_in_vaults_dir() {
        let (temp, _config, vault) = setup_temp_vault("users");
        assert_eq!(vault.path(), temp.path().join("vaults").join("users.db"));
        assert!(vault.path().exists());
        assert!(vault.is_open());
        assert!(vault.is_thread_safe());
    }

    #[test]
    fn test_open_missing_without_create_fails() {
        let temp = TempDir::new().unwrap();
        let config = Config::builder().root_dir(temp.path()).build();
        let err = Vault::open_in(&config, "ghost", OpenOptions::new().create_if_missing(false))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!config.vault_path("ghost").unwrap().exists());
    }

    #[test]
    fn test_session_error_rolls_back() {
        let (_temp, _config, vault) = setup_temp_vault("tx");
        let result: Result<()> = vault.with_session(|s| {
            s.put("a", &1)?;
            Err(VaultError::MissingKey)
        });
        assert!(result.is_err());
        assert!(!vault.has("a").unwrap());
    }

    #[test]
    fn test_session_ok_commits_together() {
        let (_temp, _config, vault) = setup_temp_vault("tx");
        vault
            .with_session(|s| {
                s.put("a", &1)?;
                s.put("b", &2)?;
                s.delete("a")
            })
            .unwrap();
        assert_eq!(vault.keys::<String>().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn test_reentrant_call_is_busy() {
        let (_temp, _config, vault) = setup_temp_vault("reentrant");
        let inner = vault.with_session(|_| Ok(vault.len()));
        assert!(matches!(inner, Ok(Err(VaultError::Busy))));
    }

    #[test]
    fn test_iter_crosses_pages() {
        let (_temp, _config, vault) = setup_temp_vault("paged");
        vault.put_many((0..5).map(|i| (i, i * 10))).unwrap();

        let mut keys: Vec<i64> = vault.iter().collect::<Result<_>>().unwrap();
        keys.sort();
        assert_eq!(keys, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_operations_after_close_fail() {
        let (_temp, config, vault) = setup_temp_vault("closing");
        vault.put("k", "v").unwrap();
        vault.delete_vault().unwrap();

        assert!(!vault.is_open());
        assert!(matches!(vault.len(), Err(VaultError::Closed { .. })));
        assert!(matches!(vault.iter::<String>().next(), Some(Err(VaultError::Closed { .. }))));
        assert!(matches!(vault.delete_vault(), Err(VaultError::Closed { .. })));
        assert!(!config.vault_path("closing").unwrap().exists());
    }

    #[test]
    fn test_delete_vault_survives_failed_close() {
        let (_temp, config, vault) = setup_temp_vault("stuck");
        vault.put("k", "v").unwrap();

        vault
            .delete_vault_with(|conn| Err((conn, rusqlite::Error::InvalidQuery)))
            .unwrap();

        assert!(!vault.is_open());
        assert!(matches!(vault.len(), Err(VaultError::Closed { .. })));
        assert!(!config.vault_path("stuck").unwrap().exists());
    }
}
