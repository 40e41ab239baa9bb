//! Cache configuration

use core_runtime::config::FeedConfig;
use std::path::PathBuf;

/// Default on-disk budget: 500 MiB.
pub const DEFAULT_CAPACITY_BYTES: u64 = 500 * 1024 * 1024;

/// Configuration for the on-disk media cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding `index.json` and `blobs/`.
    pub root: PathBuf,

    /// Upper bound on the sum of stored bytes across all entries.
    pub capacity_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("feed_media_cache"),
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
        }
    }
}

impl CacheConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn from_feed_config(config: &FeedConfig) -> Self {
        Self {
            root: config.cache_dir.clone(),
            capacity_bytes: config.cache_capacity_bytes(),
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_capacity_bytes(mut self, bytes: u64) -> Self {
        self.capacity_bytes = bytes;
        self
    }

    /// Set capacity in whole megabytes.
    pub fn with_capacity_mb(self, mb: u64) -> Self {
        self.with_capacity_bytes(mb * 1024 * 1024)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity_bytes == 0 {
            return Err("capacity_bytes must be greater than 0".to_string());
        }

        if self.root.as_os_str().is_empty() {
            return Err("cache root cannot be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity_bytes, 500 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::new("/tmp/feed")
            .with_capacity_mb(64)
            .with_root("/tmp/other");

        assert_eq!(config.capacity_bytes, 64 * 1024 * 1024);
        assert_eq!(config.root, PathBuf::from("/tmp/other"));
    }

    #[test]
    fn test_config_validation() {
        assert!(CacheConfig::default()
            .with_capacity_bytes(0)
            .validate()
            .is_err());
        assert!(CacheConfig::new("").validate().is_err());
    }
}
