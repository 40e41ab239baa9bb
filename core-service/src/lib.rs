//! Core service façade and bootstrap helpers.
//!
//! This crate is the composition root of the feed media core. It wires the
//! host-provided byte-range source and clock from a [`FeedConfig`] into one
//! cache lifecycle, one data source factory, one preload coordinator and one
//! registry, and hands the host a single [`FeedMediaService`] handle.
//!
//! Desktop apps typically enable the `desktop-shims` feature so a reqwest
//! based range source is injected when the config carries none.
//!
//! ```ignore
//! use core_runtime::config::FeedConfig;
//! use core_service::bootstrap;
//!
//! let config = FeedConfig::builder()
//!     .cache_dir(app_cache_dir.join("media_cache"))
//!     .build()?;
//! let service = bootstrap(config)?;
//!
//! service.report_position(index, &feed_urls);
//! let source = service.request_playable_source(&feed_urls[index])?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use core_async::sync::broadcast::Receiver;
use core_playback::cache::{CacheConfig, CacheLifecycle, CacheMode, CacheStats};
use core_playback::preload::{
    ClearReport, MediaSourceRegistry, PreloadConfig, PreloadCoordinator, PreloadStats,
    WindowReport,
};
use core_playback::source::{CachingDataSourceFactory, DataSource, DataSourceOptions};
use core_runtime::config::FeedConfig;
use core_runtime::events::{CoreEvent, EventBus};
use core_runtime::logging::redact_url;
use tracing::{debug, info, instrument};

/// Primary façade exposed to host applications.
///
/// Cloning is cheap; clones share the cache, the coordinator and the
/// registry.
#[derive(Clone)]
pub struct FeedMediaService {
    config: Arc<FeedConfig>,
    lifecycle: Arc<CacheLifecycle>,
    factory: CachingDataSourceFactory,
    coordinator: PreloadCoordinator,
    event_bus: EventBus,
}

impl FeedMediaService {
    /// Wires the components described by `config`. The cache is not opened
    /// until [`initialize_cache`](Self::initialize_cache).
    ///
    /// # Errors
    ///
    /// - [`CoreError::Runtime`] if the configuration is invalid
    /// - [`CoreError::CapabilityMissing`] if no byte-range source is configured
    pub fn new(config: FeedConfig) -> Result<Self> {
        config.validate()?;

        let upstream = config
            .http_source
            .clone()
            .ok_or_else(|| CoreError::CapabilityMissing {
                capability: "HttpByteRangeSource".to_string(),
                message: "FeedConfig carries no byte-range source. Build the config with \
                          FeedConfig::builder() or inject one with .http_source()."
                    .to_string(),
            })?;

        let preload_config = PreloadConfig::from_feed_config(&config);
        preload_config
            .validate()
            .map_err(CoreError::InitializationFailed)?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let lifecycle = Arc::new(
            CacheLifecycle::new(Arc::clone(&config.clock)).with_event_bus(event_bus.clone()),
        );
        let factory =
            lifecycle.data_source_factory(upstream, DataSourceOptions::from_feed_config(&config));
        let coordinator = PreloadCoordinator::new(
            preload_config,
            factory.clone(),
            Arc::new(MediaSourceRegistry::new()),
        )
        .with_event_bus(event_bus.clone());

        Ok(Self {
            config: Arc::new(config),
            lifecycle,
            factory,
            coordinator,
            event_bus,
        })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Opens the disk cache. Idempotent; a failure leaves the service in
    /// pass-through mode where playback still streams from the network.
    pub fn initialize_cache(&self) -> CacheMode {
        self.lifecycle
            .initialize_with(&CacheConfig::from_feed_config(&self.config))
    }

    /// Drops every preload and closes the disk cache. Idempotent.
    #[instrument(skip(self))]
    pub fn release_cache(&self) {
        self.coordinator.clear_all();
        self.lifecycle.release();
    }

    /// Moves the lookahead window. Never blocks on network I/O.
    pub fn report_position(&self, current_index: usize, media_keys: &[String]) -> WindowReport {
        self.coordinator.report_position(current_index, media_keys)
    }

    /// Source to hand the player for `uri`: the warmed source when one is
    /// preloaded, a fresh cache-backed (or network) source otherwise.
    pub fn request_playable_source(&self, uri: &str) -> Result<Arc<dyn DataSource>> {
        if let Some(preloaded) = self.coordinator.preloaded_source(uri) {
            debug!(uri = %redact_url(uri), "Using preloaded source");
            return Ok(preloaded.source);
        }
        Ok(self.factory.create(uri)?)
    }

    /// Cancels every preload and empties the registry. The disk cache is
    /// left intact.
    pub fn clear_all(&self) -> ClearReport {
        self.coordinator.clear_all()
    }

    /// Deletes every cached resource. Returns the number removed.
    pub fn clear_cache(&self) -> usize {
        let removed = self.lifecycle.clear_cache();
        info!(removed, "Cache cleared on request");
        removed
    }

    pub fn cache_mode(&self) -> CacheMode {
        self.lifecycle.mode()
    }

    pub fn is_cache_available(&self) -> bool {
        self.lifecycle.is_cache_available()
    }

    pub fn cache_size_bytes(&self) -> u64 {
        self.lifecycle.cache_size_bytes()
    }

    /// Cache size as megabytes with two decimals, e.g. `"12.34 MB"`.
    pub fn cache_size_display(&self) -> String {
        self.lifecycle.cache_size_display()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.lifecycle.stats()
    }

    pub fn preload_stats(&self) -> PreloadStats {
        self.coordinator.stats()
    }

    pub fn is_preloaded(&self, uri: &str) -> bool {
        self.coordinator.is_preloaded(uri)
    }

    pub fn preloaded_count(&self) -> usize {
        self.coordinator.preloaded_count()
    }

    pub fn active_preload_count(&self) -> usize {
        self.coordinator.active_task_count()
    }

    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn coordinator(&self) -> &PreloadCoordinator {
        &self.coordinator
    }

    pub fn factory(&self) -> &CachingDataSourceFactory {
        &self.factory
    }
}

/// Builds the service and opens its cache.
///
/// ```ignore
/// let service = core_service::bootstrap(config)?;
/// assert!(service.is_cache_available());
/// ```
pub fn bootstrap(config: FeedConfig) -> Result<FeedMediaService> {
    let service = FeedMediaService::new(config)?;
    let mode = service.initialize_cache();
    info!(?mode, "Feed media service ready");
    Ok(service)
}
