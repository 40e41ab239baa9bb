//! # Caching Data Source Factory
//!
//! Turns a media URI into a playable [`DataSource`]: a
//! [`CachingDataSource`] when a cache store is open, a [`NetworkDataSource`]
//! otherwise. Creation never touches the store.

use crate::cache::{CacheKey, CacheLifecycle, CacheStore};
use crate::error::{PlaybackError, Result};
use crate::source::caching::CachingDataSource;
use crate::source::network::NetworkDataSource;
use crate::source::options::{DataSourceOptions, FetchStats, FetchStatsSnapshot};
use crate::source::traits::DataSource;
use bridge_traits::http::HttpByteRangeSource;
use std::sync::Arc;

#[derive(Clone)]
enum StoreBacking {
    /// Resolve the store on every `create`, following initialize/release.
    Lifecycle(Arc<CacheLifecycle>),
    Fixed(Option<Arc<CacheStore>>),
}

/// Builds data sources that read through the shared cache.
#[derive(Clone)]
pub struct CachingDataSourceFactory {
    backing: StoreBacking,
    upstream: Arc<dyn HttpByteRangeSource>,
    options: DataSourceOptions,
    stats: Arc<FetchStats>,
}

impl CachingDataSourceFactory {
    pub fn new(
        lifecycle: Arc<CacheLifecycle>,
        upstream: Arc<dyn HttpByteRangeSource>,
        options: DataSourceOptions,
    ) -> Self {
        Self {
            backing: StoreBacking::Lifecycle(lifecycle),
            upstream,
            options,
            stats: Arc::new(FetchStats::default()),
        }
    }

    /// Factory bound to one store, or to none for pass-through.
    pub fn with_store(
        store: Option<Arc<CacheStore>>,
        upstream: Arc<dyn HttpByteRangeSource>,
        options: DataSourceOptions,
    ) -> Self {
        Self {
            backing: StoreBacking::Fixed(store),
            upstream,
            options,
            stats: Arc::new(FetchStats::default()),
        }
    }

    pub fn pass_through(
        upstream: Arc<dyn HttpByteRangeSource>,
        options: DataSourceOptions,
    ) -> Self {
        Self::with_store(None, upstream, options)
    }

    pub fn options(&self) -> &DataSourceOptions {
        &self.options
    }

    /// The store sources are currently created against.
    pub fn store(&self) -> Option<Arc<CacheStore>> {
        match &self.backing {
            StoreBacking::Lifecycle(lifecycle) => lifecycle.store(),
            StoreBacking::Fixed(store) => store.clone(),
        }
    }

    pub fn is_caching(&self) -> bool {
        self.store().is_some()
    }

    pub fn fetch_stats(&self) -> Arc<FetchStats> {
        Arc::clone(&self.stats)
    }

    pub fn stats(&self) -> FetchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Source for `uri` with the factory's default options.
    pub fn create(&self, uri: &str) -> Result<Arc<dyn DataSource>> {
        self.create_with(uri, self.options.clone())
    }

    /// Source for `uri` with custom options.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::InvalidKey`] for a blank URI
    /// - [`PlaybackError::Config`] for invalid options
    pub fn create_with(&self, uri: &str, options: DataSourceOptions) -> Result<Arc<dyn DataSource>> {
        options.validate().map_err(PlaybackError::Config)?;
        let key = CacheKey::from_uri(uri)?;

        let network = NetworkDataSource::new(
            uri.trim(),
            key.clone(),
            Arc::clone(&self.upstream),
            options,
            Arc::clone(&self.stats),
        );

        Ok(match self.store() {
            Some(store) => Arc::new(CachingDataSource::new(
                network,
                store.handle(key),
                Arc::clone(&self.stats),
            )),
            None => Arc::new(network),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockRangeSource;
    use bridge_traits::http::ByteRange;
    use bridge_traits::time::ManualClock;
    use uuid::Uuid;

    const URI: &str = "https://cdn.example.com/v/1.mp4";

    fn upstream() -> Arc<MockRangeSource> {
        Arc::new(MockRangeSource::new().with_resource(URI, 2048))
    }

    #[core_async::test]
    async fn test_pass_through_sources_are_functional() {
        let upstream = upstream();
        let factory = CachingDataSourceFactory::pass_through(upstream.clone(), Default::default());
        assert!(!factory.is_caching());

        let source = factory.create(URI).unwrap();
        assert!(!source.is_cache_backed());
        let data = source.read(ByteRange::new(0, 1024)).await.unwrap();
        assert_eq!(data.len(), 1024);
        assert_eq!(upstream.fetch_count(URI), 1);
    }

    #[test]
    fn test_blank_uri_is_rejected() {
        let factory = CachingDataSourceFactory::pass_through(upstream(), Default::default());
        assert!(matches!(
            factory.create("  "),
            Err(PlaybackError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let factory = CachingDataSourceFactory::pass_through(upstream(), Default::default());
        let options = DataSourceOptions::default().with_chunk_size(0);
        assert!(matches!(
            factory.create_with(URI, options),
            Err(PlaybackError::Config(_))
        ));
    }

    #[test]
    fn test_create_does_not_touch_store() {
        let root = std::env::temp_dir().join(format!("feed-factory-{}", Uuid::new_v4()));
        let store =
            Arc::new(CacheStore::open(&root, 4096, Arc::new(ManualClock::default())).unwrap());
        let factory =
            CachingDataSourceFactory::with_store(Some(store.clone()), upstream(), Default::default());

        let a = factory.create(URI).unwrap();
        let b = factory.create(URI).unwrap();

        assert!(a.is_cache_backed() && b.is_cache_backed());
        assert_eq!(a.key(), b.key());
        assert!(store.is_empty());
        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_follows_lifecycle() {
        let root = std::env::temp_dir().join(format!("feed-factory-{}", Uuid::new_v4()));
        let lifecycle = Arc::new(CacheLifecycle::new(Arc::new(ManualClock::default())));
        let factory = lifecycle.data_source_factory(upstream(), Default::default());

        assert!(!factory.create(URI).unwrap().is_cache_backed());

        lifecycle.initialize(&root, 4096);
        assert!(factory.create(URI).unwrap().is_cache_backed());

        lifecycle.release();
        assert!(!factory.create(URI).unwrap().is_cache_backed());
        std::fs::remove_dir_all(root).ok();
    }
}
