//! Persistent configuration for Strata.
//!
//! Loads/saves a TOML config colocated with the per-repository cache
//! directory (`<root>/.strata/config.toml`).

use crate::StrataError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level Strata configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    pub cache: CacheConfig,
    pub scan: ScanConfig,
}

impl StrataConfig {
    /// Load configuration from the given path.
    pub fn load(path: &Path) -> Result<Self, StrataError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| StrataError::Config(e.to_string()))
    }

    /// Save configuration to the given path.
    pub fn save(&self, path: &Path) -> Result<(), StrataError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| StrataError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from the repository's config path, or return defaults if the
    /// file doesn't exist or fails to parse.
    pub fn load_or_default(root: &Path) -> Self {
        let path = Self::config_path(root, &CacheConfig::default().dir_name);
        if path.exists() {
            Self::load(&path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Config path inside the cache directory.
    pub fn config_path(root: &Path, dir_name: &str) -> PathBuf {
        root.join(dir_name).join("config.toml")
    }
}

/// Incremental-cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name of the cache directory under the repository root.
    pub dir_name: String,
    /// Flush the persisted documents after this many dirty entries.
    pub flush_every: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir_name: ".strata".to_string(),
            flush_every: 25,
        }
    }
}

/// Repository-scan configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Files larger than this many bytes are skipped during batch
    /// extraction.
    pub max_file_size: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_size: 2_000_000,
        }
    }
}
