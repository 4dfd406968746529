//! Error types for vaults
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using VaultError
pub type Result<T> = std::result::Result<T, VaultError>;

/// Unified error type for vault operations
#[derive(Debug, Error)]
pub enum VaultError {
    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("No such vault: '{name}'")]
    NotFound { name: String },

    #[error("Vault '{name}' is unavailable (deleted or closed)")]
    Closed { name: String },

    #[error("Vault is busy: already in use by another caller")]
    Busy,

    // -------------------------------------------------------------------------
    // Mapping Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    MissingKey,

    #[error("Vault is empty")]
    EmptyStore,

    // -------------------------------------------------------------------------
    // Backend Errors
    // -------------------------------------------------------------------------
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for VaultError {
    fn from(err: rusqlite::Error) -> Self {
        VaultError::Backend(err.to_string())
    }
}

impl VaultError {
    /// True for subscript-style misses (`item`, `delete`, `pop`)
    pub fn is_missing_key(&self) -> bool {
        matches!(self, VaultError::MissingKey)
    }

    /// True when a vault was opened without `create_if_missing` and does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::NotFound { .. })
    }
}
