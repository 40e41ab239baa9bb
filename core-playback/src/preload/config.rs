//! Preload configuration

use core_runtime::config::FeedConfig;
use std::time::Duration;

/// Lookahead window and worker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadConfig {
    /// Items after the current index kept warm (default: 2)
    pub preload_count: usize,

    /// Start delay per window offset (default: 500ms)
    pub base_delay: Duration,

    /// Preloads fetching at the same time (default: 2)
    pub max_concurrent: usize,

    /// Leading bytes fetched per item (default: 1 MiB)
    pub prefetch_bytes: u64,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            preload_count: 2,
            base_delay: Duration::from_millis(500),
            max_concurrent: 2,
            prefetch_bytes: 1024 * 1024,
        }
    }
}

impl PreloadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_feed_config(config: &FeedConfig) -> Self {
        Self {
            preload_count: config.preload_count,
            base_delay: config.preload_base_delay,
            max_concurrent: config.max_concurrent_preloads,
            prefetch_bytes: config.prefetch_bytes,
        }
    }

    pub fn with_preload_count(mut self, count: usize) -> Self {
        self.preload_count = count;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_concurrent(mut self, count: usize) -> Self {
        self.max_concurrent = count;
        self
    }

    pub fn with_prefetch_bytes(mut self, bytes: u64) -> Self {
        self.prefetch_bytes = bytes;
        self
    }

    /// Completed sources kept in the registry before the coldest are dropped.
    pub fn retention_limit(&self) -> usize {
        self.preload_count.saturating_mul(2)
    }

    /// Start delay for the item `offset` positions ahead.
    pub fn delay_for(&self, offset: usize) -> Duration {
        self.base_delay.saturating_mul(offset as u32)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be at least 1".to_string());
        }

        if self.prefetch_bytes == 0 {
            return Err("prefetch_bytes must be greater than 0".to_string());
        }

        Ok(())
    }
}
