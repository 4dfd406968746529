//! Configuration for vaults
//!
//! Centralized configuration with sensible defaults, plus the process-wide
//! default used by [`Vault::open`](crate::Vault::open).
//!
//! The global configuration must be set before the first vault is opened;
//! vaults capture their path at open time and never look at it again.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{Result, VaultError};

/// Process-wide configuration used by `Vault::open` / `Vault::open_with`
static GLOBAL: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

/// Main configuration for vault storage
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all vault files
    /// Internal structure:
    ///   {root_dir}/
    ///     └── vaults/
    ///         ├── users.db
    ///         └── sessions.db
    pub root_dir: PathBuf,

    /// Name of the reserved subdirectory holding vault files
    pub vaults_dir_name: String,

    /// Extension appended to each vault name
    pub file_extension: String,

    // -------------------------------------------------------------------------
    // Engine Configuration
    // -------------------------------------------------------------------------
    /// How long SQLite waits on a locked file before failing (milliseconds)
    pub busy_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Iteration Configuration
    // -------------------------------------------------------------------------
    /// Number of keys fetched per round-trip by the lazy key iterator
    pub page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            vaults_dir_name: "vaults".to_string(),
            file_extension: "db".to_string(),
            busy_timeout_ms: 5000,
            page_size: 256,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Directory that holds every vault file
    pub fn vaults_dir(&self) -> PathBuf {
        self.root_dir.join(&self.vaults_dir_name)
    }

    /// Backing file for the vault called `name`
    pub fn vault_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self
            .vaults_dir()
            .join(format!("{}.{}", name, self.file_extension)))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the root directory
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.root_dir = path.into();
        self
    }

    /// Set the reserved subdirectory name
    pub fn vaults_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.vaults_dir_name = name.into();
        self
    }

    /// Set the vault file extension (without the dot)
    pub fn file_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.file_extension = ext.into();
        self
    }

    /// Set the SQLite busy timeout (in milliseconds)
    pub fn busy_timeout_ms(mut self, ms: u64) -> Self {
        self.config.busy_timeout_ms = ms;
        self
    }

    /// Set the lazy iterator page size (minimum 1)
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size.max(1);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

// =============================================================================
// Process-wide configuration
// =============================================================================

/// Snapshot of the process-wide configuration
pub fn global() -> Config {
    GLOBAL.read().clone()
}

/// Replace the process-wide configuration
pub fn set_global(config: Config) {
    tracing::info!(
        root = %config.root_dir.display(),
        vaults_dir = %config.vaults_dir().display(),
        "Global vault configuration replaced"
    );
    *GLOBAL.write() = config;
}

/// Set the process-wide root path and create its vaults folder
pub fn set_root_path(path: impl AsRef<Path>) -> Result<()> {
    let mut config = global();
    config.root_dir = path.as_ref().to_path_buf();
    std::fs::create_dir_all(config.vaults_dir())?;
    set_global(config);
    Ok(())
}

/// Vault names become file names, so they must not escape the vaults folder
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(VaultError::Config(format!(
            "invalid vault name: '{}'",
            name
        )));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(VaultError::Config(format!(
            "vault name must not contain path separators: '{}'",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_path_layout() {
        let config = Config::builder().root_dir("/tmp/root").build();
        let path = config.vault_path("users").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/root/vaults/users.db"));
    }

    #[test]
    fn test_custom_layout() {
        let config = Config::builder()
            .root_dir("/data")
            .vaults_dir_name("store")
            .file_extension("sqlite")
            .build();
        assert_eq!(
            config.vault_path("x").unwrap(),
            PathBuf::from("/data/store/x.sqlite")
        );
    }

    #[test]
    fn test_rejects_bad_names() {
        let config = Config::default();
        for name in ["", ".", "..", "a/b", "a\\b"] {
            assert!(
                matches!(config.vault_path(name), Err(VaultError::Config(_))),
                "name {:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_page_size_is_at_least_one() {
        let config = Config::builder().page_size(0).build();
        assert_eq!(config.page_size, 1);
    }
}
