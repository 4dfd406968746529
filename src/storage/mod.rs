//! Storage Module
//!
//! Durable table store: one SQLite file per vault holding a single relation.
//!
//! ## Responsibilities
//! - Open/create the backing file and ensure the schema exists
//! - Point operations (get/put/delete) on encoded key bytes
//! - Count, scan, and keyset-paged key listing
//! - Truncate the relation or remove the backing file entirely
//! - Map every engine error to `VaultError::Backend`
//!
//! ## Schema
//! ```text
//! ┌──────────────────────────┬─────────────────────────────┐
//! │ key   BLOB PRIMARY KEY   │ value BLOB (tag + payload)  │
//! └──────────────────────────┴─────────────────────────────┘
//! ```
//!
//! Transactions are owned by the caller: [`Table`] runs its statements on
//! whatever connection or transaction it is given.

mod schema;
mod table;

pub use schema::{
    configure_connection, ensure_schema, open_connection, remove_backing_file, TABLE_NAME,
};
pub use table::{RawEntry, Table};
