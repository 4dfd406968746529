//! # Vaults
//!
//! Persistent, dictionary-like key/value stores backed by SQLite:
//! - One named vault per database file
//! - Any serde value as key or value, with a fast path for common shapes
//! - Every operation (and every bulk operation) is one transaction
//! - Safe to share across threads
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Vault                                 │
//! │        (mapping API, lifecycle, connection lock)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ one transaction per call
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Session                                │
//! │              (typed ops inside a transaction)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │    Codec    │          │   Storage   │
//!   │ (fast/fall- │          │  (SQLite    │
//!   │  back tag)  │          │   table)    │
//!   └─────────────┘          └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use vaults::{set_root_path, Vault};
//!
//! set_root_path("/tmp/app")?;
//! let vault = Vault::open("users")?;
//! vault.put("alice", &42)?;
//! assert_eq!(vault.get::<_, i64>("alice")?, Some(42));
//! # Ok::<(), vaults::VaultError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod storage;
pub mod vault;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, VaultError};
pub use config::{set_root_path, Config};
pub use codec::Value;
pub use vault::{Keys, OpenOptions, Session, Vault};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of vaults
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
