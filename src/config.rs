//! Configuration for TileVault
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a TileVault store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all pyramids
    /// Internal structure:
    ///   {data_dir}/
    ///     └── {pyramid}/
    ///           ├── metadata.bin     (metadata blob)
    ///           └── {zoom}/
    ///                 ├── splits.idx         (split index)
    ///                 └── part-00001.seg     (segment files)
    pub data_dir: PathBuf,

    /// Regenerate a level's split index from its segments when the persisted
    /// index is missing or empty
    pub regenerate_empty_index: bool,

    // -------------------------------------------------------------------------
    // Metadata Configuration
    // -------------------------------------------------------------------------
    /// Max number of pyramids whose metadata is cached
    pub metadata_cache_capacity: usize,

    /// How long a cached metadata record stays valid
    pub metadata_cache_ttl: Duration,

    /// Visibility label attached to metadata and tile mutations
    pub default_visibility: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./tilevault_data"),
            regenerate_empty_index: true,
            metadata_cache_capacity: 64,
            metadata_cache_ttl: Duration::from_secs(300),
            default_visibility: String::new(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all pyramids)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Regenerate missing/empty split indexes on load
    pub fn regenerate_empty_index(mut self, enabled: bool) -> Self {
        self.config.regenerate_empty_index = enabled;
        self
    }

    /// Set the metadata cache capacity (number of pyramids)
    pub fn metadata_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.metadata_cache_capacity = capacity;
        self
    }

    /// Set the metadata cache time-to-live
    pub fn metadata_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.metadata_cache_ttl = ttl;
        self
    }

    /// Set the visibility label used for written mutations
    pub fn default_visibility(mut self, label: impl Into<String>) -> Self {
        self.config.default_visibility = label.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
