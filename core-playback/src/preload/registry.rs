//! Registry of warmed, ready-to-play sources.

use crate::cache::CacheKey;
use crate::source::DataSource;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// A source whose leading bytes were fetched ahead of playback.
#[derive(Clone)]
pub struct PreloadedSource {
    pub key: CacheKey,
    /// Feed index the preload targeted.
    pub target_index: usize,
    pub source: Arc<dyn DataSource>,
    pub prefetched_bytes: u64,
    pub total_length: Option<u64>,
    pub completed_at: DateTime<Utc>,
}

impl std::fmt::Debug for PreloadedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadedSource")
            .field("key", &self.key)
            .field("target_index", &self.target_index)
            .field("cache_backed", &self.source.is_cache_backed())
            .field("prefetched_bytes", &self.prefetched_bytes)
            .field("total_length", &self.total_length)
            .field("completed_at", &self.completed_at)
            .finish()
    }
}

/// Key → preloaded source map, ordered by the last pass in which each key
/// was inside the lookahead window.
///
/// Reads never reorder entries and never fetch. Only the preload coordinator
/// writes.
pub struct MediaSourceRegistry {
    entries: RwLock<LruCache<String, PreloadedSource>>,
}

impl Default for MediaSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSourceRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(LruCache::unbounded()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<PreloadedSource> {
        self.entries.read().peek(key.as_str()).cloned()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().contains(key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys, most recently in-window first.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn remove(&self, key: &CacheKey) -> Option<PreloadedSource> {
        self.entries.write().pop(key.as_str())
    }

    /// Drops every entry. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        count
    }

    pub(crate) fn put(&self, source: PreloadedSource) {
        self.entries.write().put(source.key.to_string(), source);
    }

    /// Marks `key` as seen in the current window. Returns `false` if absent.
    pub(crate) fn touch(&self, key: &CacheKey) -> bool {
        let mut entries = self.entries.write();
        if entries.contains(key.as_str()) {
            entries.promote(key.as_str());
            true
        } else {
            false
        }
    }

    /// Evicts from the cold end until at most `limit` entries remain,
    /// never evicting a key in `protected`.
    pub(crate) fn evict_beyond(&self, limit: usize, protected: &HashSet<String>) -> Vec<String> {
        let mut entries = self.entries.write();
        let mut evicted = Vec::new();

        while entries.len() > limit {
            let victim = entries
                .iter()
                .rev()
                .map(|(k, _)| k)
                .find(|k| !protected.contains(*k))
                .cloned();

            let Some(victim) = victim else {
                break;
            };
            entries.pop(&victim);
            evicted.push(victim);
        }

        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{CachingDataSourceFactory, DataSourceOptions};
    use crate::test_utils::MockRangeSource;

    fn preloaded(name: &str) -> PreloadedSource {
        let uri = format!("https://cdn.example.com/{name}.mp4");
        let factory = CachingDataSourceFactory::pass_through(
            Arc::new(MockRangeSource::new()),
            DataSourceOptions::default(),
        );
        PreloadedSource {
            key: CacheKey::from_uri(&uri).unwrap(),
            target_index: 0,
            source: factory.create(&uri).unwrap(),
            prefetched_bytes: 0,
            total_length: None,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_get_does_not_reorder() {
        let registry = MediaSourceRegistry::new();
        let a = preloaded("a");
        let b = preloaded("b");
        registry.put(a.clone());
        registry.put(b.clone());

        assert!(registry.get(&a.key).is_some());
        assert_eq!(registry.keys(), vec![b.key.to_string(), a.key.to_string()]);
    }

    #[test]
    fn test_touch_promotes() {
        let registry = MediaSourceRegistry::new();
        let a = preloaded("a");
        let b = preloaded("b");
        registry.put(a.clone());
        registry.put(b.clone());

        assert!(registry.touch(&a.key));
        assert_eq!(registry.keys()[0], a.key.to_string());
        assert!(!registry.touch(&preloaded("missing").key));
    }

    #[test]
    fn test_evict_beyond_skips_protected() {
        let registry = MediaSourceRegistry::new();
        let sources: Vec<_> = ["a", "b", "c", "d"].iter().map(|n| preloaded(n)).collect();
        for source in &sources {
            registry.put(source.clone());
        }

        // "a" is coldest but protected.
        let protected: HashSet<String> = [sources[0].key.to_string()].into_iter().collect();
        let evicted = registry.evict_beyond(2, &protected);

        assert_eq!(
            evicted,
            vec![sources[1].key.to_string(), sources[2].key.to_string()]
        );
        assert!(registry.contains(&sources[0].key));
        assert!(registry.contains(&sources[3].key));
    }

    #[test]
    fn test_remove_and_clear() {
        let registry = MediaSourceRegistry::new();
        let a = preloaded("a");
        registry.put(a.clone());
        registry.put(preloaded("b"));

        assert!(registry.remove(&a.key).is_some());
        assert!(registry.remove(&a.key).is_none());
        assert_eq!(registry.clear(), 1);
        assert!(registry.is_empty());
    }
}
