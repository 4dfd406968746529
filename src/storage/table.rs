//! Key/value table operations
//!
//! A borrowed view over one connection (or an open transaction, which
//! derefs to one). Every engine error leaves this module as
//! `VaultError::Backend`.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, VaultError};

/// Encoded key and tagged value record, as stored
pub type RawEntry = (Vec<u8>, Vec<u8>);

/// Operations on the `dict` relation
#[derive(Clone, Copy)]
pub struct Table<'c> {
    conn: &'c Connection,
}

impl<'c> Table<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Fetch the record stored under `key`
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value FROM dict WHERE key = ?1")?;
        let value = stmt
            .query_row(params![key], |row| row.get::<_, Vec<u8>>(0))
            .optional()?;
        Ok(value)
    }

    /// Check whether `key` is present without reading its record
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM dict WHERE key = ?1")?;
        Ok(stmt.exists(params![key])?)
    }

    /// Insert or overwrite (upsert)
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO dict (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )?;
        stmt.execute(params![key, value])?;
        Ok(())
    }

    /// Remove `key`, reporting whether it existed
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached("DELETE FROM dict WHERE key = ?1")?;
        let removed = stmt.execute(params![key])?;
        Ok(removed > 0)
    }

    /// Remove `key` and hand back its record
    pub fn take(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self.get(key)?;
        if value.is_some() {
            self.delete(key)?;
        }
        Ok(value)
    }

    /// Number of stored entries
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM dict", [], |row| row.get(0))?;
        usize::try_from(count)
            .map_err(|_| VaultError::Backend(format!("Row count out of range: {}", count)))
    }

    /// Any one entry; which one is unspecified
    pub fn first(&self) -> Result<Option<RawEntry>> {
        let entry = self
            .conn
            .query_row("SELECT key, value FROM dict LIMIT 1", [], |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .optional()?;
        Ok(entry)
    }

    /// Walk every entry through a live cursor
    ///
    /// Rows are streamed from the engine one at a time; nothing is
    /// buffered here. The visitor can stop the walk early by returning an
    /// error.
    pub fn scan<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(Vec<u8>, Vec<u8>) -> Result<()>,
    {
        let mut stmt = self.conn.prepare_cached("SELECT key, value FROM dict")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            visit(row.get(0)?, row.get(1)?)?;
        }
        Ok(())
    }

    /// Up to `limit` keys strictly greater than `after`, in key order
    pub fn keys_after(&self, after: Option<&[u8]>, limit: usize) -> Result<Vec<Vec<u8>>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut keys = Vec::new();
        match after {
            Some(after) => {
                let mut stmt = self.conn.prepare_cached(
                    "SELECT key FROM dict WHERE key > ?1 ORDER BY key LIMIT ?2",
                )?;
                let mut rows = stmt.query(params![after, limit])?;
                while let Some(row) = rows.next()? {
                    keys.push(row.get(0)?);
                }
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare_cached("SELECT key FROM dict ORDER BY key LIMIT ?1")?;
                let mut rows = stmt.query(params![limit])?;
                while let Some(row) = rows.next()? {
                    keys.push(row.get(0)?);
                }
            }
        }
        Ok(keys)
    }

    /// Truncate the relation, returning how many rows were removed
    pub fn delete_all(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM dict", [])?)
    }
}
