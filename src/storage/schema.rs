//! Connection setup and schema for vault files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use crate::error::Result;

/// Name of the single relation every vault file holds
pub const TABLE_NAME: &str = "dict";

/// Journal side files SQLite may leave next to a database
const SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// Opens a connection with consistent flags.
///
/// `create` controls whether a missing file is created; the caller has
/// already decided whether that is allowed.
pub fn open_connection(path: &Path, create: bool) -> Result<Connection> {
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    if create {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }
    Ok(Connection::open_with_flags(path, flags)?)
}

/// Configures durability and lock waiting.
pub fn configure_connection(conn: &Connection, busy_timeout_ms: u64) -> Result<()> {
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA synchronous = FULL;",
    )?;
    Ok(())
}

/// Creates the key/value relation if it does not exist yet.
///
/// Two columns only: the encoded key (unique) and the tagged value record.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS dict (
            key     BLOB    NOT NULL PRIMARY KEY,
            value   BLOB    NOT NULL
        );",
    )?;
    Ok(())
}

/// Removes a vault file together with any journal side files.
///
/// Returns whether the main database file existed.
pub fn remove_backing_file(path: &Path) -> Result<bool> {
    let existed = remove_if_present(path)?;
    for suffix in SIDECAR_SUFFIXES {
        remove_if_present(&sidecar_path(path, suffix))?;
    }
    Ok(existed)
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
