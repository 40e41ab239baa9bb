//! # Feed Media Configuration
//!
//! Builder-based configuration for the media cache and preloading core.
//!
//! ## Overview
//!
//! [`FeedConfig`] carries every tunable of the subsystem plus the injected
//! host capabilities. The builder fails fast with actionable messages when a
//! required value is missing or a setting is out of range.
//!
//! ## Required Values
//!
//! - `cache_dir` - Root directory of the on-disk media cache
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpByteRangeSource` - Upstream byte-range fetching (desktop default: reqwest)
//! - `Clock` - Time source for cache access ordering (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, a `ReqwestRangeSource` is
//! injected automatically if no range source is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::FeedConfig;
//! use std::time::Duration;
//!
//! let config = FeedConfig::builder()
//!     .cache_dir("/data/user/0/app/cache/media_cache")
//!     .cache_capacity_mb(500)
//!     .preload_count(2)
//!     .preload_base_delay(Duration::from_millis(500))
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::FeedConfig;
//!
//! // Missing cache directory
//! let config = FeedConfig::builder()
//!     .preload_count(2)
//!     .build()
//!     .expect("Should fail - cache_dir is required");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpByteRangeSource, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CACHE_CAPACITY_MB: u64 = 500;
pub const DEFAULT_PRELOAD_COUNT: usize = 2;
pub const DEFAULT_PRELOAD_BASE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_CONCURRENT_PRELOADS: usize = 2;
pub const DEFAULT_PREFETCH_BYTES: u64 = 1024 * 1024;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_AGENT: &str = "FeedMedia-Rust/0.1";
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Upper bound on the lookahead window; larger values only waste bandwidth.
const MAX_PRELOAD_COUNT: usize = 16;

/// Configuration for the feed media core.
///
/// Use [`FeedConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct FeedConfig {
    /// Root directory of the on-disk media cache
    pub cache_dir: PathBuf,

    /// Maximum on-disk cache size in megabytes
    pub cache_capacity_mb: u64,

    /// Number of upcoming items kept warm
    pub preload_count: usize,

    /// Stagger applied per window offset before a preload starts
    pub preload_base_delay: Duration,

    /// Maximum preloads fetching at the same time
    pub max_concurrent_preloads: usize,

    /// Leading bytes of each upcoming item fetched ahead of playback
    pub prefetch_bytes: u64,

    /// Connect timeout for upstream requests
    pub connect_timeout: Duration,

    /// Read timeout for upstream requests
    pub read_timeout: Duration,

    /// Drop and refetch corrupt cache entries instead of failing the read
    pub ignore_cache_on_error: bool,

    /// User agent sent with upstream requests
    pub user_agent: String,

    /// Size of each upstream fetch when filling a cache gap
    pub chunk_size: usize,

    /// Capacity of the event broadcast channel
    pub event_buffer_size: usize,

    /// Upstream byte-range source (optional with desktop default)
    pub http_source: Option<Arc<dyn HttpByteRangeSource>>,

    /// Time source for cache access ordering
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedConfig")
            .field("cache_dir", &self.cache_dir)
            .field("cache_capacity_mb", &self.cache_capacity_mb)
            .field("preload_count", &self.preload_count)
            .field("preload_base_delay", &self.preload_base_delay)
            .field("max_concurrent_preloads", &self.max_concurrent_preloads)
            .field("prefetch_bytes", &self.prefetch_bytes)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("ignore_cache_on_error", &self.ignore_cache_on_error)
            .field("user_agent", &self.user_agent)
            .field("chunk_size", &self.chunk_size)
            .field("event_buffer_size", &self.event_buffer_size)
            .field(
                "http_source",
                &self
                    .http_source
                    .as_ref()
                    .map(|_| "HttpByteRangeSource { ... }"),
            )
            .field("clock", &"Clock { ... }")
            .finish()
    }
}

impl FeedConfig {
    /// Create a new configuration builder.
    pub fn builder() -> FeedConfigBuilder {
        FeedConfigBuilder::default()
    }

    /// Cache capacity in bytes.
    pub fn cache_capacity_bytes(&self) -> u64 {
        self.cache_capacity_mb.saturating_mul(1024 * 1024)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.cache_capacity_mb == 0 {
            return Err(Error::Config(
                "Cache capacity must be greater than 0 MB".to_string(),
            ));
        }

        if self.preload_count > MAX_PRELOAD_COUNT {
            return Err(Error::Config(format!(
                "Preload count must be at most {} (got {})",
                MAX_PRELOAD_COUNT, self.preload_count
            )));
        }

        if self.max_concurrent_preloads == 0 {
            return Err(Error::Config(
                "At least one concurrent preload must be allowed".to_string(),
            ));
        }

        if self.chunk_size == 0 {
            return Err(Error::Config("Chunk size must be greater than 0".to_string()));
        }

        if self.connect_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(Error::Config(
                "Connect and read timeouts must be non-zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_source_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpByteRangeSource".to_string(),
        message: "An upstream byte-range source is required to fetch media. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestRangeSource. \
                 Mobile: inject the platform's streaming HTTP client."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_source() -> Result<Arc<dyn HttpByteRangeSource>> {
    use bridge_desktop::ReqwestRangeSource;

    let source = ReqwestRangeSource::new().map_err(|e| {
        Error::Internal(format!("Failed to initialize default ReqwestRangeSource: {}", e))
    })?;
    Ok(Arc::new(source))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_source() -> Result<Arc<dyn HttpByteRangeSource>> {
    Err(http_source_missing_error())
}

/// Builder for [`FeedConfig`].
#[derive(Default)]
pub struct FeedConfigBuilder {
    cache_dir: Option<PathBuf>,
    cache_capacity_mb: Option<u64>,
    preload_count: Option<usize>,
    preload_base_delay: Option<Duration>,
    max_concurrent_preloads: Option<usize>,
    prefetch_bytes: Option<u64>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    ignore_cache_on_error: Option<bool>,
    user_agent: Option<String>,
    chunk_size: Option<usize>,
    event_buffer_size: Option<usize>,
    http_source: Option<Arc<dyn HttpByteRangeSource>>,
    clock: Option<Arc<dyn Clock>>,
}

impl FeedConfigBuilder {
    /// Set the cache root directory (required).
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Set the maximum cache size in megabytes (default 500).
    pub fn cache_capacity_mb(mut self, size_mb: u64) -> Self {
        self.cache_capacity_mb = Some(size_mb);
        self
    }

    /// Set how many upcoming items are preloaded (default 2).
    pub fn preload_count(mut self, count: usize) -> Self {
        self.preload_count = Some(count);
        self
    }

    /// Set the per-offset preload stagger (default 500 ms).
    pub fn preload_base_delay(mut self, delay: Duration) -> Self {
        self.preload_base_delay = Some(delay);
        self
    }

    pub fn max_concurrent_preloads(mut self, max: usize) -> Self {
        self.max_concurrent_preloads = Some(max);
        self
    }

    pub fn prefetch_bytes(mut self, bytes: u64) -> Self {
        self.prefetch_bytes = Some(bytes);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn ignore_cache_on_error(mut self, ignore: bool) -> Self {
        self.ignore_cache_on_error = Some(ignore);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = Some(bytes);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Inject the upstream byte-range source.
    pub fn http_source(mut self, source: Arc<dyn HttpByteRangeSource>) -> Self {
        self.http_source = Some(source);
        self
    }

    /// Inject the time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required value is missing or invalid,
    /// and [`Error::CapabilityMissing`] when no range source is available.
    pub fn build(self) -> Result<FeedConfig> {
        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config("Cache directory is required. Use .cache_dir() to set it.".to_string())
        })?;

        let http_source = match self.http_source {
            Some(source) => source,
            None => provide_default_http_source()?,
        };

        let config = FeedConfig {
            cache_dir,
            cache_capacity_mb: self.cache_capacity_mb.unwrap_or(DEFAULT_CACHE_CAPACITY_MB),
            preload_count: self.preload_count.unwrap_or(DEFAULT_PRELOAD_COUNT),
            preload_base_delay: self.preload_base_delay.unwrap_or(DEFAULT_PRELOAD_BASE_DELAY),
            max_concurrent_preloads: self
                .max_concurrent_preloads
                .unwrap_or(DEFAULT_MAX_CONCURRENT_PRELOADS),
            prefetch_bytes: self.prefetch_bytes.unwrap_or(DEFAULT_PREFETCH_BYTES),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT),
            ignore_cache_on_error: self.ignore_cache_on_error.unwrap_or(true),
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            chunk_size: self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            http_source: Some(http_source),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{RangeRequest, RangeResponse};
    use bytes::Bytes;

    struct StaticSource;

    #[async_trait]
    impl HttpByteRangeSource for StaticSource {
        async fn fetch_range(&self, request: RangeRequest) -> BridgeResult<RangeResponse> {
            Ok(RangeResponse {
                status: 206,
                start: request.range.start,
                total_length: Some(0),
                body: Bytes::new(),
            })
        }
    }

    fn builder() -> FeedConfigBuilder {
        FeedConfig::builder()
            .cache_dir("/tmp/feed-media-test")
            .http_source(Arc::new(StaticSource))
    }

    #[test]
    fn test_defaults_match_player_cache() {
        let config = builder().build().unwrap();

        assert_eq!(config.cache_capacity_mb, 500);
        assert_eq!(config.cache_capacity_bytes(), 500 * 1024 * 1024);
        assert_eq!(config.preload_count, 2);
        assert_eq!(config.preload_base_delay, Duration::from_millis(500));
        assert_eq!(config.max_concurrent_preloads, 2);
        assert_eq!(config.prefetch_bytes, 1024 * 1024);
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.read_timeout, Duration::from_secs(30));
        assert!(config.ignore_cache_on_error);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.chunk_size, 256 * 1024);
        assert_eq!(config.event_buffer_size, 100);
        assert!(config.http_source.is_some());
    }

    #[test]
    fn test_builder_requires_cache_dir() {
        let result = FeedConfig::builder()
            .http_source(Arc::new(StaticSource))
            .build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Cache directory is required"));
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let result = builder().cache_capacity_mb(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let result = builder().max_concurrent_preloads(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_oversized_window_is_rejected() {
        let result = builder().preload_count(MAX_PRELOAD_COUNT + 1).build();
        assert!(result.unwrap_err().to_string().contains("Preload count"));
    }

    #[test]
    fn test_zero_preload_count_is_allowed() {
        let config = builder().preload_count(0).build().unwrap();
        assert_eq!(config.preload_count, 0);
    }

    #[test]
    fn test_custom_values_are_kept() {
        let config = builder()
            .cache_capacity_mb(64)
            .preload_count(3)
            .preload_base_delay(Duration::from_millis(10))
            .user_agent("custom/2.0")
            .ignore_cache_on_error(false)
            .build()
            .unwrap();

        assert_eq!(config.cache_capacity_mb, 64);
        assert_eq!(config.preload_count, 3);
        assert_eq!(config.preload_base_delay, Duration::from_millis(10));
        assert_eq!(config.user_agent, "custom/2.0");
        assert!(!config.ignore_cache_on_error);
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_http_source_without_desktop_shims() {
        let result = FeedConfig::builder().cache_dir("/tmp/x").build();
        assert!(matches!(result, Err(Error::CapabilityMissing { .. })));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_default_http_source() {
        let config = FeedConfig::builder().cache_dir("/tmp/x").build().unwrap();
        assert!(config.http_source.is_some());
    }

    #[test]
    fn test_debug_hides_capabilities() {
        let config = builder().build().unwrap();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("HttpByteRangeSource { ... }"));
        assert!(rendered.contains("cache_capacity_mb: 500"));
    }
}
