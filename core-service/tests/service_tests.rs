//! End-to-end tests for the feed media service.

use bridge_traits::http::ByteRange;
use bridge_traits::time::ManualClock;
use core_async::time::{sleep, Duration};
use core_playback::cache::CacheMode;
use core_playback::test_utils::{pattern, MockRangeSource};
use core_runtime::config::FeedConfig;
use core_runtime::events::{CacheEvent, CoreEvent};
use core_service::{bootstrap, CoreError, FeedMediaService};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

const LEN: usize = 4096;
const CAPACITY_BYTES: u64 = 1024 * 1024;

struct Feed {
    dir: PathBuf,
    keys: Vec<String>,
    upstream: Arc<MockRangeSource>,
}

impl Feed {
    fn new() -> Self {
        let keys: Vec<String> = (0..10)
            .map(|i| format!("https://cdn.example.com/clips/{i}.mp4?sig=abc"))
            .collect();
        let upstream = Arc::new(MockRangeSource::new());
        for key in &keys {
            upstream.insert(key.clone(), pattern(LEN));
        }
        Self {
            dir: std::env::temp_dir().join(format!("feed-service-it-{}", Uuid::new_v4())),
            keys,
            upstream,
        }
    }

    fn config(&self) -> FeedConfig {
        self.config_at(self.dir.join("media_cache"))
    }

    fn config_at(&self, cache_dir: PathBuf) -> FeedConfig {
        FeedConfig::builder()
            .cache_dir(cache_dir)
            .cache_capacity_mb(1)
            .preload_base_delay(Duration::ZERO)
            .http_source(self.upstream.clone())
            .clock(Arc::new(ManualClock::default()))
            .build()
            .unwrap()
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[core_async::test]
async fn test_scrolling_feed_plays_from_preloads() {
    let feed = Feed::new();
    let service = bootstrap(feed.config()).unwrap();
    assert_eq!(service.cache_mode(), CacheMode::Cached);

    for index in 0..feed.keys.len() {
        let report = service.report_position(index, &feed.keys);
        assert!(report.window.len() <= 2);

        let upcoming: Vec<&String> = feed.keys.iter().skip(index + 1).take(2).collect();
        assert!(wait_until(|| upcoming.iter().all(|key| service.is_preloaded(key))).await);

        let fetches_before = feed.upstream.fetch_count(&feed.keys[index]);
        let source = service.request_playable_source(&feed.keys[index]).unwrap();
        let data = source.read(ByteRange::new(0, LEN as u64)).await.unwrap();

        assert_eq!(data, pattern(LEN));
        if index > 0 {
            // Warmed one or two steps earlier; nothing goes back to the network.
            assert_eq!(feed.upstream.fetch_count(&feed.keys[index]), fetches_before);
        }
        assert!(service.cache_size_bytes() <= CAPACITY_BYTES);
        assert!(service.preloaded_count() <= 4);
    }

    // Every clip is on disk now, so a second pass is served locally.
    service.clear_all();
    let fetches = feed.upstream.total_fetches();
    for key in &feed.keys {
        let source = service.request_playable_source(key).unwrap();
        let data = source.read(ByteRange::new(0, LEN as u64)).await.unwrap();
        assert_eq!(data.len(), LEN);
    }
    assert_eq!(feed.upstream.total_fetches(), fetches);
    assert_eq!(service.cache_size_bytes(), (LEN * feed.keys.len()) as u64);
}

#[core_async::test]
async fn test_cached_bytes_survive_restart() {
    let feed = Feed::new();
    {
        let service = bootstrap(feed.config()).unwrap();
        let source = service.request_playable_source(&feed.keys[0]).unwrap();
        source.read(ByteRange::new(0, LEN as u64)).await.unwrap();
        service.release_cache();
    }
    let fetches = feed.upstream.total_fetches();

    let service = bootstrap(feed.config()).unwrap();
    assert_eq!(service.cache_size_bytes(), LEN as u64);

    let source = service.request_playable_source(&feed.keys[0]).unwrap();
    let data = source.read(ByteRange::new(0, LEN as u64)).await.unwrap();
    assert_eq!(data, pattern(LEN));
    assert_eq!(feed.upstream.total_fetches(), fetches);
}

#[core_async::test]
async fn test_unusable_cache_dir_falls_back_to_network() {
    let feed = Feed::new();
    std::fs::create_dir_all(&feed.dir).unwrap();
    let blocked = feed.dir.join("not-a-dir");
    std::fs::write(&blocked, b"occupied").unwrap();

    let service = bootstrap(feed.config_at(blocked)).unwrap();
    assert_eq!(service.cache_mode(), CacheMode::PassThrough);
    assert!(!service.is_cache_available());

    let source = service.request_playable_source(&feed.keys[0]).unwrap();
    assert!(!source.is_cache_backed());
    let data = source.read(ByteRange::new(0, 100)).await.unwrap();
    assert_eq!(data, pattern(LEN).slice(0..100));

    service.report_position(0, &feed.keys);
    assert!(wait_until(|| service.preloaded_count() == 2).await);
    assert_eq!(service.cache_size_display(), "0.00 MB");
}

#[core_async::test]
async fn test_release_is_idempotent_and_drops_preloads() {
    let feed = Feed::new();
    let service = bootstrap(feed.config()).unwrap();

    service.report_position(0, &feed.keys);
    assert!(wait_until(|| service.preloaded_count() == 2).await);

    service.release_cache();
    service.release_cache();

    assert_eq!(service.cache_mode(), CacheMode::Uninitialized);
    assert_eq!(service.preloaded_count(), 0);
    assert_eq!(service.cache_size_bytes(), 0);

    // Playback keeps working without a cache.
    let source = service.request_playable_source(&feed.keys[3]).unwrap();
    assert!(!source.is_cache_backed());

    assert_eq!(service.initialize_cache(), CacheMode::Cached);
    assert_eq!(service.cache_size_bytes(), (2 * LEN) as u64);
}

#[core_async::test]
async fn test_clear_cache_empties_disk() {
    let feed = Feed::new();
    let service = bootstrap(feed.config()).unwrap();

    for key in &feed.keys[..3] {
        let source = service.request_playable_source(key).unwrap();
        source.read(ByteRange::new(0, LEN as u64)).await.unwrap();
    }
    assert_eq!(service.cache_size_display(), "0.01 MB");

    assert_eq!(service.clear_cache(), 3);
    assert_eq!(service.cache_size_bytes(), 0);
    assert!(service.is_cache_available());
}

#[test]
fn test_initialize_emits_event() {
    let feed = Feed::new();
    let service = FeedMediaService::new(feed.config()).unwrap();
    let mut events = service.subscribe_events();

    assert_eq!(service.initialize_cache(), CacheMode::Cached);
    assert_eq!(service.initialize_cache(), CacheMode::Cached);

    match events.try_recv().unwrap() {
        CoreEvent::Cache(CacheEvent::Initialized { capacity_bytes, .. }) => {
            assert_eq!(capacity_bytes, CAPACITY_BYTES);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(events.try_recv().is_err());
}

#[test]
fn test_missing_range_source_is_reported() {
    let feed = Feed::new();
    let mut config = feed.config();
    config.http_source = None;

    let err = FeedMediaService::new(config).err().unwrap();
    assert!(matches!(err, CoreError::CapabilityMissing { .. }));
}
