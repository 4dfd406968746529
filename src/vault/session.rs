//! Vault session
//!
//! Typed mapping operations running inside one open transaction. Every
//! public `Vault` call is a short session; `Vault::with_session` hands one
//! to the caller so several operations commit (or roll back) together.

use std::collections::HashMap;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec;
use crate::error::{Result, VaultError};
use crate::storage::{RawEntry, Table};

/// Mapping operations bound to one transaction
///
/// Keys and values are encoded on the way in and decoded on the way out;
/// encoding happens inside the transaction, so a failure part-way through
/// a bulk call leaves nothing behind once the session rolls back.
pub struct Session<'s> {
    table: Table<'s>,
    vault: &'s str,
}

impl<'s> Session<'s> {
    pub(crate) fn new(table: Table<'s>, vault: &'s str) -> Self {
        Self { table, vault }
    }

    pub(crate) fn table(&self) -> Table<'s> {
        self.table
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
        let key = codec::encode(key)?;
        let value = codec::encode(value)?;
        self.table.put(&key, &value)?;
        tracing::debug!(vault = %self.vault, bytes = value.len(), "Key stored");
        Ok(())
    }

    /// Value under `key`, or `None` when absent
    pub fn get<K, V>(&self, key: &K) -> Result<Option<V>>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        let key = codec::encode(key)?;
        match self.table.get(&key)? {
            Some(record) => codec::decode(&record).map(Some),
            None => {
                tracing::debug!(vault = %self.vault, "Key not found");
                Ok(None)
            }
        }
    }

    /// Value under `key`, or `default` when absent
    pub fn get_or<K, V>(&self, key: &K, default: V) -> Result<V>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Value under `key`; `MissingKey` when absent
    pub fn item<K, V>(&self, key: &K) -> Result<V>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        self.get(key)?.ok_or(VaultError::MissingKey)
    }

    pub fn has<K: Serialize + ?Sized>(&self, key: &K) -> Result<bool> {
        let key = codec::encode(key)?;
        self.table.contains(&key)
    }

    /// Remove `key`; `MissingKey` when absent
    pub fn delete<K: Serialize + ?Sized>(&self, key: &K) -> Result<()> {
        let key = codec::encode(key)?;
        if !self.table.delete(&key)? {
            return Err(VaultError::MissingKey);
        }
        tracing::debug!(vault = %self.vault, "Key deleted");
        Ok(())
    }

    /// Remove `key` and return its value; `MissingKey` when absent
    pub fn pop<K, V>(&self, key: &K) -> Result<V>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        let key = codec::encode(key)?;
        let record = self.table.take(&key)?.ok_or(VaultError::MissingKey)?;
        tracing::debug!(vault = %self.vault, "Key popped");
        codec::decode(&record)
    }

    /// Remove and return an arbitrary entry; `EmptyStore` when empty
    pub fn pop_item<K, V>(&self) -> Result<(K, V)>
    where
        K: DeserializeOwned,
        V: DeserializeOwned,
    {
        let (raw_key, record) = self.table.first()?.ok_or(VaultError::EmptyStore)?;
        let key = codec::decode(&raw_key)?;
        let value = codec::decode(&record)?;
        self.table.delete(&raw_key)?;
        tracing::debug!(vault = %self.vault, "Entry popped");
        Ok((key, value))
    }

    /// Existing value under `key`, or store `default` there and return it
    pub fn setdefault<K, V>(&self, key: &K, default: V) -> Result<V>
    where
        K: Serialize + ?Sized,
        V: Serialize + DeserializeOwned,
    {
        let key = codec::encode(key)?;
        if let Some(record) = self.table.get(&key)? {
            return codec::decode(&record);
        }
        self.table.put(&key, &codec::encode(&default)?)?;
        Ok(default)
    }

    // =========================================================================
    // Bulk operations
    // =========================================================================

    /// Store every pair; returns how many were written
    pub fn put_many<K, V, I>(&self, entries: I) -> Result<usize>
    where
        K: Serialize,
        V: Serialize,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut written = 0;
        for (key, value) in entries {
            self.table
                .put(&codec::encode(&key)?, &codec::encode(&value)?)?;
            written += 1;
        }
        tracing::debug!(vault = %self.vault, count = written, "Bulk put");
        Ok(written)
    }

    /// Values for the keys that are present; absent keys are left out
    pub fn get_many<K, V, I>(&self, keys: I) -> Result<HashMap<K, V>>
    where
        K: Serialize + Eq + Hash,
        V: DeserializeOwned,
        I: IntoIterator<Item = K>,
    {
        let mut found = HashMap::new();
        for key in keys {
            if let Some(record) = self.table.get(&codec::encode(&key)?)? {
                found.insert(key, codec::decode(&record)?);
            }
        }
        tracing::debug!(vault = %self.vault, count = found.len(), "Bulk get");
        Ok(found)
    }

    /// Remove the keys that are present and return their values
    pub fn pop_many<K, V, I>(&self, keys: I) -> Result<HashMap<K, V>>
    where
        K: Serialize + Eq + Hash,
        V: DeserializeOwned,
        I: IntoIterator<Item = K>,
    {
        let mut removed = HashMap::new();
        for key in keys {
            if let Some(record) = self.table.take(&codec::encode(&key)?)? {
                removed.insert(key, codec::decode(&record)?);
            }
        }
        tracing::debug!(vault = %self.vault, count = removed.len(), "Bulk pop");
        Ok(removed)
    }

    /// True iff every key is present
    pub fn has_keys<K, I>(&self, keys: I) -> Result<bool>
    where
        K: Serialize,
        I: IntoIterator<Item = K>,
    {
        for key in keys {
            if !self.table.contains(&codec::encode(&key)?)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // =========================================================================
    // Whole-vault operations
    // =========================================================================

    /// Remove every entry
    pub fn clear(&self) -> Result<()> {
        let removed = self.table.delete_all()?;
        tracing::info!(vault = %self.vault, count = removed, "Vault cleared");
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        self.table.count()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All keys, in no particular order
    pub fn keys<K: DeserializeOwned>(&self) -> Result<Vec<K>> {
        let mut keys = Vec::new();
        self.table.scan(|key, _| {
            keys.push(codec::decode(&key)?);
            Ok(())
        })?;
        Ok(keys)
    }

    /// All values, in no particular order
    pub fn values<V: DeserializeOwned>(&self) -> Result<Vec<V>> {
        let mut values = Vec::new();
        self.table.scan(|_, record| {
            values.push(codec::decode(&record)?);
            Ok(())
        })?;
        Ok(values)
    }

    /// All entries, in no particular order
    pub fn items<K, V>(&self) -> Result<Vec<(K, V)>>
    where
        K: DeserializeOwned,
        V: DeserializeOwned,
    {
        let mut items = Vec::new();
        self.table.scan(|key, record| {
            items.push((codec::decode(&key)?, codec::decode(&record)?));
            Ok(())
        })?;
        Ok(items)
    }

    // =========================================================================
    // Raw records
    // =========================================================================

    /// Every entry exactly as stored
    pub(crate) fn raw_entries(&self) -> Result<Vec<RawEntry>> {
        let mut entries = Vec::new();
        self.table.scan(|key, record| {
            entries.push((key, record));
            Ok(())
        })?;
        Ok(entries)
    }

    /// Store an already-encoded entry
    pub(crate) fn put_raw(&self, key: &[u8], record: &[u8]) -> Result<()> {
        self.table.put(key, record)
    }
}
