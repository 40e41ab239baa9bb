//! Data source options and shared fetch counters.

use core_runtime::config::FeedConfig;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_AGENT: &str = "FeedMedia-Rust/0.1";
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Per-source network and cache behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceOptions {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Drop a corrupt cache entry and refetch instead of failing the read.
    pub ignore_cache_on_error: bool,
    pub user_agent: String,
    /// Size of each upstream fetch when filling a gap.
    pub chunk_size: usize,
}

impl Default for DataSourceOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            ignore_cache_on_error: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl DataSourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_feed_config(config: &FeedConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            ignore_cache_on_error: config.ignore_cache_on_error,
            user_agent: config.user_agent.clone(),
            chunk_size: config.chunk_size,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_ignore_cache_on_error(mut self, ignore: bool) -> Self {
        self.ignore_cache_on_error = ignore;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Validate options.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }

        if self.connect_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err("timeouts must be greater than 0".to_string());
        }

        if self.user_agent.trim().is_empty() {
            return Err("user_agent cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Counters shared by every source a factory creates.
#[derive(Debug, Default)]
pub struct FetchStats {
    network_requests: AtomicU64,
    network_bytes: AtomicU64,
    cache_hit_bytes: AtomicU64,
}

impl FetchStats {
    pub fn record_network(&self, bytes: u64) {
        self.network_requests.fetch_add(1, Ordering::Relaxed);
        self.network_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self, bytes: u64) {
        self.cache_hit_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FetchStatsSnapshot {
        FetchStatsSnapshot {
            network_requests: self.network_requests.load(Ordering::Relaxed),
            network_bytes: self.network_bytes.load(Ordering::Relaxed),
            cache_hit_bytes: self.cache_hit_bytes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStatsSnapshot {
    pub network_requests: u64,
    pub network_bytes: u64,
    pub cache_hit_bytes: u64,
}

impl FetchStatsSnapshot {
    /// Share of bytes served from the cache, 0.0 to 1.0.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.network_bytes + self.cache_hit_bytes;
        if total == 0 {
            0.0
        } else {
            self.cache_hit_bytes as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = DataSourceOptions::default();
        assert_eq!(options.connect_timeout, Duration::from_secs(15));
        assert_eq!(options.read_timeout, Duration::from_secs(30));
        assert!(options.ignore_cache_on_error);
        assert_eq!(options.user_agent, "FeedMedia-Rust/0.1");
        assert_eq!(options.chunk_size, 256 * 1024);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_validation() {
        assert!(DataSourceOptions::new().with_chunk_size(0).validate().is_err());
        assert!(DataSourceOptions::new()
            .with_read_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(DataSourceOptions::new()
            .with_user_agent("  ")
            .validate()
            .is_err());
    }

    #[test]
    fn test_fetch_stats() {
        let stats = FetchStats::default();
        stats.record_network(300);
        stats.record_network(100);
        stats.record_cache_hit(400);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.network_requests, 2);
        assert_eq!(snapshot.network_bytes, 400);
        assert_eq!(snapshot.cache_hit_bytes, 400);
        assert_eq!(snapshot.hit_ratio(), 0.5);
    }
}
