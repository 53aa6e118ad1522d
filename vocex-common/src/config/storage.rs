//! Storage configuration types shared across Vocex services.

use std::path::PathBuf;

/// Database size limit configuration.
///
/// This enum provides a clean TOML interface and easy extensibility for different units.
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseSize {
    /// Limited to a specific size in GB
    Gb(usize),
    /// Limited to a specific size in MB
    Mb(usize),
}

impl Default for DatabaseSize {
    fn default() -> Self {
        DatabaseSize::Gb(64)
    }
}

impl PartialEq for DatabaseSize {
    fn eq(&self, other: &Self) -> bool {
        self.to_byte_count() == other.to_byte_count()
    }
}

impl DatabaseSize {
    /// Convert to bytes
    pub fn to_byte_count(&self) -> usize {
        match self {
            DatabaseSize::Gb(gb) => gb * 1024 * 1024 * 1024,
            DatabaseSize::Mb(mb) => mb * 1024 * 1024,
        }
    }
}

/// Database configuration.
///
/// Configures the directory and size limit of the explorer's LMDB environment.
/// Each chain gets its own sub-directory so explorers for different chains
/// never share a store.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database directory.
    pub path: PathBuf,
    /// Chain identifier, used as the sub-directory name.
    pub chain_id: String,
    /// Database size limit. Defaults to 64 GB.
    pub size: DatabaseSize,
}

impl DatabaseConfig {
    /// Returns the directory the LMDB environment lives in.
    pub fn env_path(&self) -> PathBuf {
        self.path.join(&self.chain_id)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./vocex_db"),
            chain_id: "vochain".to_string(),
            size: DatabaseSize::default(),
        }
    }
}
