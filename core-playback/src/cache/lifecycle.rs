//! # Cache Lifecycle
//!
//! Owns the single [`CacheStore`] of a process (or of a test) and decides
//! between cached and pass-through operation.
//!
//! Initialization never fails outward: when the store cannot be opened the
//! lifecycle falls back to [`CacheMode::PassThrough`] and data sources go
//! straight to the network. A corrupt index additionally wipes the cache
//! directory so the next start begins clean.

use crate::cache::config::CacheConfig;
use crate::cache::stats::{format_size_mb, CacheStats};
use crate::cache::store::CacheStore;
use crate::error::PlaybackError;
use crate::source::{CachingDataSourceFactory, DataSourceOptions};
use bridge_traits::http::HttpByteRangeSource;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::strip_path;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Operating mode of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// `initialize` has not run, or the cache was released.
    Uninitialized,
    /// A store is open; data sources read through it.
    Cached,
    /// The store could not be opened; data sources go to the network.
    PassThrough,
}

struct LifecycleState {
    store: Option<Arc<CacheStore>>,
    mode: CacheMode,
    root: Option<PathBuf>,
}

/// Explicitly owned replacement for a global cache singleton.
pub struct CacheLifecycle {
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    state: Mutex<LifecycleState>,
}

impl Default for CacheLifecycle {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl CacheLifecycle {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            event_bus: None,
            state: Mutex::new(LifecycleState {
                store: None,
                mode: CacheMode::Uninitialized,
                root: None,
            }),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Opens the store at `root`. Safe to call repeatedly and from many
    /// threads; only the first successful call opens a store.
    ///
    /// While in pass-through mode a later call retries the open.
    #[instrument(skip(self, root))]
    pub fn initialize(&self, root: &Path, capacity_bytes: u64) -> CacheMode {
        let mut state = self.state.lock();

        if state.store.is_some() {
            debug!("Cache already initialized");
            return CacheMode::Cached;
        }

        let root_display = root.display().to_string();
        state.root = Some(root.to_path_buf());

        match CacheStore::open(root, capacity_bytes, Arc::clone(&self.clock)) {
            Ok(store) => {
                let store = match &self.event_bus {
                    Some(bus) => store.with_event_bus(bus.clone()),
                    None => store,
                };
                let stats = store.stats();
                state.store = Some(Arc::new(store));
                state.mode = CacheMode::Cached;

                info!(
                    dir = %strip_path(&root_display),
                    entries = stats.entries,
                    size_bytes = stats.total_bytes,
                    "Media cache initialized"
                );
                self.emit(CacheEvent::Initialized {
                    capacity_bytes,
                    size_bytes: stats.total_bytes,
                    entries: stats.entries,
                });
            }
            Err(e @ PlaybackError::CorruptIndex { .. }) => {
                warn!(error = %e, "Cache index corrupt, wiping cache directory");
                let wiped = match fs::remove_dir_all(root) {
                    Ok(()) => true,
                    Err(wipe_err) => {
                        warn!(error = %wipe_err, "Failed to wipe cache directory");
                        false
                    }
                };
                state.mode = CacheMode::PassThrough;
                self.emit(CacheEvent::PassThrough {
                    reason: e.to_string(),
                    wiped,
                });
            }
            Err(e) => {
                warn!(error = %e, "Failed to open media cache, continuing without cache");
                state.mode = CacheMode::PassThrough;
                self.emit(CacheEvent::PassThrough {
                    reason: e.to_string(),
                    wiped: false,
                });
            }
        }

        state.mode
    }

    /// Validates `config` and opens the store it describes.
    pub fn initialize_with(&self, config: &CacheConfig) -> CacheMode {
        if let Err(reason) = config.validate() {
            warn!(%reason, "Invalid cache configuration, continuing without cache");
            let mut state = self.state.lock();
            if state.store.is_none() {
                state.mode = CacheMode::PassThrough;
            }
            return state.mode;
        }
        self.initialize(&config.root, config.capacity_bytes)
    }

    /// Flushes and detaches the store. Idempotent.
    ///
    /// Sources created before the release keep their handle but fall back to
    /// the network, so a later [`initialize`](Self::initialize) owns the
    /// directory alone.
    #[instrument(skip(self))]
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.mode = CacheMode::Uninitialized;

        let Some(store) = state.store.take() else {
            debug!("Cache release requested with no open store");
            return;
        };

        // Detach before the lock drops so no new store can open first.
        if let Err(e) = store.release() {
            warn!(error = %e, "Failed to persist cache index on release");
        }
        drop(state);
        drop(store);

        info!("Media cache released");
        self.emit(CacheEvent::Released);
    }

    pub fn store(&self) -> Option<Arc<CacheStore>> {
        self.state.lock().store.clone()
    }

    pub fn mode(&self) -> CacheMode {
        self.state.lock().mode
    }

    pub fn root(&self) -> Option<PathBuf> {
        self.state.lock().root.clone()
    }

    pub fn is_cache_available(&self) -> bool {
        self.state.lock().store.is_some()
    }

    /// Removes every cached resource. Returns the number removed.
    pub fn clear_cache(&self) -> usize {
        let Some(store) = self.store() else {
            warn!("Cache not available, nothing to clear");
            return 0;
        };

        match store.clear() {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Failed to clear media cache");
                0
            }
        }
    }

    pub fn cache_size_bytes(&self) -> u64 {
        self.store().map_or(0, |store| store.size())
    }

    /// Cache size formatted as megabytes, e.g. `"12.34 MB"`.
    pub fn cache_size_display(&self) -> String {
        format_size_mb(self.cache_size_bytes())
    }

    pub fn stats(&self) -> Option<CacheStats> {
        self.store().map(|store| store.stats())
    }

    /// Factory whose sources read through this lifecycle's store, or go
    /// straight to the network while no store is open.
    pub fn data_source_factory(
        self: &Arc<Self>,
        upstream: Arc<dyn HttpByteRangeSource>,
        options: DataSourceOptions,
    ) -> CachingDataSourceFactory {
        CachingDataSourceFactory::new(Arc::clone(self), upstream, options)
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}
