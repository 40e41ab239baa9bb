//! # Cache Store
//!
//! Bounded, persistent store of byte ranges keyed by [`CacheKey`].
//!
//! Layout under the root directory:
//!
//! ```text
//! root/
//! ├── index.json              entry metadata (atomic rewrite)
//! └── blobs/<sha256>.blob     sparse file per resource, bytes at their offsets
//! ```
//!
//! The index is rewritten when an entry appears or disappears. Range growth
//! and access times only mark it dirty and land on [`CacheStore::flush`],
//! [`CacheStore::release`] or drop.
//!
//! Every operation is synchronous: one `parking_lot` mutex guards the index
//! and blob I/O, and it is never held across an await point. The sum of stored
//! bytes never exceeds the capacity; eviction is least-recently-used at
//! resource granularity and runs inside [`CacheStore::write`] before the new
//! bytes land.

use crate::cache::index::{CacheEntry, CacheIndex};
use crate::cache::key::CacheKey;
use crate::cache::stats::CacheStats;
use crate::error::{PlaybackError, Result};
use bridge_traits::http::ByteRange;
use bridge_traits::time::Clock;
use bytes::Bytes;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::{redact_url, strip_path};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const BLOB_DIR: &str = "blobs";

/// Result of [`CacheStore::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// New bytes were stored; `evicted` lists resources removed to make room.
    Written {
        new_bytes: u64,
        evicted: Vec<CacheKey>,
    },
    /// Every byte of the write was already stored.
    AlreadyCached,
    /// The resource would not fit even in an empty cache.
    Skipped { required: u64, capacity: u64 },
    /// The store was released; nothing was stored.
    Detached,
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written { .. })
    }
}

struct StoreState {
    index: CacheIndex,
    size_bytes: u64,
    /// Index changed since the last persist.
    dirty: bool,
    /// Set by [`CacheStore::release`]; the store no longer touches disk.
    released: bool,
    seq: u64,
    evictions: u64,
    skipped_writes: u64,
}

impl StoreState {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

/// Persistent, size-bounded media cache.
pub struct CacheStore {
    root: PathBuf,
    blob_dir: PathBuf,
    capacity_bytes: u64,
    clock: Arc<dyn Clock>,
    state: Mutex<StoreState>,
    event_bus: Option<EventBus>,
}

impl CacheStore {
    /// Opens (or creates) the store rooted at `root`.
    ///
    /// Entries whose blob is missing or shorter than their stored ranges are
    /// dropped, blobs with no entry are deleted, and the store is trimmed to
    /// `capacity_bytes`.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::CorruptIndex`] if `index.json` cannot be parsed
    /// - [`PlaybackError::Io`] if the directories cannot be created
    #[instrument(skip(root, clock))]
    pub fn open(root: &Path, capacity_bytes: u64, clock: Arc<dyn Clock>) -> Result<Self> {
        if capacity_bytes == 0 {
            return Err(PlaybackError::Config(
                "cache capacity must be greater than 0".to_string(),
            ));
        }

        let blob_dir = root.join(BLOB_DIR);
        fs::create_dir_all(&blob_dir)?;

        let mut index = CacheIndex::load(root)?;
        let mut changed = validate_entries(&mut index, &blob_dir);
        sweep_orphan_blobs(&index, &blob_dir);

        let size_bytes = index.total_size();
        let seq = index.max_seq();

        let store = Self {
            root: root.to_path_buf(),
            blob_dir,
            capacity_bytes,
            clock,
            state: Mutex::new(StoreState {
                index,
                size_bytes,
                dirty: false,
                released: false,
                seq,
                evictions: 0,
                skipped_writes: 0,
            }),
            event_bus: None,
        };

        {
            let mut state = store.state.lock();
            if state.size_bytes > capacity_bytes {
                let evicted = store.evict_until(&mut state, capacity_bytes, None);
                info!(
                    evicted = evicted.len(),
                    "Trimmed cache to new capacity on open"
                );
                changed = true;
            }
            if changed {
                state.index.save(&store.root)?;
            }
            let root_display = store.root.display().to_string();
            info!(
                dir = %strip_path(&root_display),
                entries = state.index.entries.len(),
                size_bytes = state.size_bytes,
                capacity_bytes,
                "Cache store opened"
            );
        }

        Ok(store)
    }

    /// Set event bus for eviction events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Per-key handle. Never touches disk.
    pub fn handle(self: &Arc<Self>, key: CacheKey) -> CacheHandle {
        CacheHandle {
            store: Arc::clone(self),
            key,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the contiguous cached prefix of `range`, or `None` when the
    /// first byte of the range is not stored.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::CacheCorruption`] when the blob is missing or
    /// shorter than the index claims.
    pub fn read_cached(&self, key: &CacheKey, range: ByteRange) -> Result<Option<Bytes>> {
        if range.is_empty() {
            return Ok(Some(Bytes::new()));
        }

        let mut state = self.state.lock();
        if state.released {
            return Ok(None);
        }
        let now = self.clock.unix_timestamp_millis();
        let seq = state.next_seq();

        let Some(entry) = state.index.entries.get_mut(key.as_str()) else {
            return Ok(None);
        };

        let available = entry.ranges.contiguous_from(range.start);
        if available == 0 {
            return Ok(None);
        }
        let len = range.length.map_or(available, |requested| requested.min(available));

        let path = self.blob_dir.join(&entry.blob);
        let data = read_blob(&path, range.start, len).map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::UnexpectedEof => PlaybackError::CacheCorruption {
                key: key.to_string(),
                reason: e.to_string(),
            },
            _ => PlaybackError::Io(e),
        })?;

        entry.touch(now, seq);
        state.dirty = true;
        Ok(Some(Bytes::from(data)))
    }

    /// First span of `range` that is not stored.
    ///
    /// An open-ended range is bounded by the known total length; with no known
    /// length the returned gap is open-ended too.
    pub fn next_gap(&self, key: &CacheKey, range: ByteRange) -> Option<ByteRange> {
        if range.is_empty() {
            return None;
        }

        let state = self.state.lock();
        if state.released {
            return Some(range);
        }
        let Some(entry) = state.index.entries.get(key.as_str()) else {
            return Some(range);
        };

        let end = range.end().or(entry.total_length);
        entry
            .ranges
            .first_gap(range.start, end)
            .map(|(start, gap_end)| match gap_end {
                Some(gap_end) => ByteRange::new(start, gap_end - start),
                None => ByteRange::from_offset(start),
            })
    }

    /// Stores `data` at `offset`, evicting least-recently-used resources
    /// until the new bytes fit. A released store stores nothing.
    #[instrument(skip(self, key, data), fields(key = %redact_url(key.as_str()), len = data.len()))]
    pub fn write(&self, key: &CacheKey, offset: u64, data: &[u8]) -> Result<WriteOutcome> {
        if data.is_empty() {
            return Ok(WriteOutcome::AlreadyCached);
        }
        let end = offset + data.len() as u64;

        let mut state = self.state.lock();
        if state.released {
            return Ok(WriteOutcome::Detached);
        }
        let now = self.clock.unix_timestamp_millis();
        let seq = state.next_seq();

        let (existing_size, new_bytes, is_new) = match state.index.entries.get_mut(key.as_str()) {
            Some(entry) => {
                let new_bytes = entry.ranges.uncovered(offset, end);
                if new_bytes == 0 {
                    entry.touch(now, seq);
                    state.dirty = true;
                    return Ok(WriteOutcome::AlreadyCached);
                }
                (entry.size(), new_bytes, false)
            }
            None => (0, data.len() as u64, true),
        };

        let required = existing_size + new_bytes;
        if required > self.capacity_bytes {
            state.skipped_writes += 1;
            warn!(
                required,
                capacity = self.capacity_bytes,
                "Resource larger than cache capacity, not caching"
            );
            return Ok(WriteOutcome::Skipped {
                required,
                capacity: self.capacity_bytes,
            });
        }

        let target = self.capacity_bytes - new_bytes;
        let evicted = if state.size_bytes > target {
            self.evict_until(&mut state, target, Some(key))
        } else {
            Vec::new()
        };

        let blob = key.blob_name();
        if let Err(e) = write_blob(&self.blob_dir.join(&blob), offset, data) {
            if !evicted.is_empty() {
                state.index.save(&self.root)?;
            }
            return Err(e.into());
        }

        let entry = state
            .index
            .entries
            .entry(key.to_string())
            .or_insert_with(|| CacheEntry::new(key.clone(), now, seq));
        let added = entry.ranges.insert(offset, end);
        entry.touch(now, seq);

        state.size_bytes += added;
        if is_new || !evicted.is_empty() {
            state.index.save(&self.root)?;
            state.dirty = false;
        } else {
            state.dirty = true;
        }

        debug!(
            new_bytes = added,
            size_bytes = state.size_bytes,
            "Stored bytes in cache"
        );

        Ok(WriteOutcome::Written {
            new_bytes: added,
            evicted,
        })
    }

    /// Records the full length of a resource. No-op when nothing is stored.
    pub fn set_total_length(&self, key: &CacheKey, total_length: u64) {
        let mut state = self.state.lock();
        if state.released {
            return;
        }
        if let Some(entry) = state.index.entries.get_mut(key.as_str()) {
            if entry.total_length != Some(total_length) {
                entry.total_length = Some(total_length);
                state.dirty = true;
            }
        }
    }

    pub fn total_length(&self, key: &CacheKey) -> Option<u64> {
        let state = self.state.lock();
        if state.released {
            return None;
        }
        state
            .index
            .entries
            .get(key.as_str())
            .and_then(|entry| entry.total_length)
    }

    /// Clone of the index entry for `key`.
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.state.lock().index.entries.get(key.as_str()).cloned()
    }

    /// Removes `key`. Returns `false` when it was not cached.
    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        let mut state = self.state.lock();
        if state.released {
            return Ok(false);
        }
        let Some(entry) = state.index.entries.remove(key.as_str()) else {
            return Ok(false);
        };

        state.size_bytes -= entry.size();
        remove_blob(&self.blob_dir.join(&entry.blob));
        state.index.save(&self.root)?;
        state.dirty = false;

        debug!(key = %redact_url(key.as_str()), bytes = entry.size(), "Removed cache entry");
        Ok(true)
    }

    /// Removes every entry. Returns the number removed.
    #[instrument(skip(self))]
    pub fn clear(&self) -> Result<usize> {
        let removed = {
            let mut state = self.state.lock();
            if state.released {
                return Ok(0);
            }
            let entries: Vec<CacheEntry> = state.index.entries.drain().map(|(_, e)| e).collect();
            for entry in &entries {
                remove_blob(&self.blob_dir.join(&entry.blob));
            }
            state.size_bytes = 0;
            state.index.save(&self.root)?;
            state.dirty = false;
            entries.len()
        };

        info!(entries_removed = removed, "Cache cleared");
        self.emit(CacheEvent::Cleared {
            entries_removed: removed,
        });
        Ok(removed)
    }

    /// Persists pending index changes.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.dirty && !state.released {
            state.index.save(&self.root)?;
            state.dirty = false;
        }
        Ok(())
    }

    /// Persists pending changes and detaches the store from its directory.
    ///
    /// Handles that outlive the release read nothing, store nothing and never
    /// rewrite the index, so a store opened later on the same root stays the
    /// only writer. Idempotent.
    pub fn release(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.released {
            return Ok(());
        }
        let saved = if state.dirty {
            state.index.save(&self.root)
        } else {
            Ok(())
        };
        state.released = true;
        state.dirty = false;
        saved
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    pub fn size(&self) -> u64 {
        self.state.lock().size_bytes
    }

    pub fn capacity(&self) -> u64 {
        self.capacity_bytes
    }

    pub fn len(&self) -> usize {
        self.state.lock().index.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().index.entries.contains_key(key.as_str())
    }

    /// Cached keys, most recently used first.
    pub fn keys(&self) -> Vec<CacheKey> {
        let state = self.state.lock();
        let mut entries: Vec<&CacheEntry> = state.index.entries.values().collect();
        entries.sort_by(|a, b| b.lru_rank().cmp(&a.lru_rank()));
        entries.into_iter().map(|e| e.key.clone()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.index.entries.len(),
            complete_entries: state
                .index
                .entries
                .values()
                .filter(|e| e.is_complete())
                .count(),
            total_bytes: state.size_bytes,
            capacity_bytes: self.capacity_bytes,
            evictions: state.evictions,
            skipped_writes: state.skipped_writes,
            calculated_at: self.clock.unix_timestamp_millis(),
        }
    }

    /// Evicts oldest entries (never `protect`) until `size_bytes <= target`.
    fn evict_until(
        &self,
        state: &mut StoreState,
        target: u64,
        protect: Option<&CacheKey>,
    ) -> Vec<CacheKey> {
        let mut evicted = Vec::new();

        while state.size_bytes > target {
            let victim = state
                .index
                .entries
                .values()
                .filter(|e| protect.map_or(true, |p| e.key != *p))
                .min_by_key(|e| e.lru_rank())
                .map(|e| e.key.to_string());

            let Some(victim) = victim else {
                break;
            };
            let Some(entry) = state.index.entries.remove(&victim) else {
                break;
            };

            let freed = entry.size();
            state.size_bytes -= freed;
            state.evictions += 1;
            remove_blob(&self.blob_dir.join(&entry.blob));

            debug!(key = %redact_url(entry.key.as_str()), bytes_freed = freed, "Evicted cache entry");
            self.emit(CacheEvent::Evicted {
                key: entry.key.to_string(),
                bytes_freed: freed,
            });
            evicted.push(entry.key);
        }

        evicted
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "Failed to persist cache index on drop");
        }
    }
}

/// Cheap per-key view of a [`CacheStore`].
#[derive(Clone)]
pub struct CacheHandle {
    store: Arc<CacheStore>,
    key: CacheKey,
}

impl CacheHandle {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn read_cached(&self, range: ByteRange) -> Result<Option<Bytes>> {
        self.store.read_cached(&self.key, range)
    }

    pub fn next_gap(&self, range: ByteRange) -> Option<ByteRange> {
        self.store.next_gap(&self.key, range)
    }

    pub fn write(&self, offset: u64, data: &[u8]) -> Result<WriteOutcome> {
        self.store.write(&self.key, offset, data)
    }

    pub fn total_length(&self) -> Option<u64> {
        self.store.total_length(&self.key)
    }

    pub fn set_total_length(&self, total_length: u64) {
        self.store.set_total_length(&self.key, total_length)
    }

    pub fn is_cached(&self) -> bool {
        self.store.contains(&self.key)
    }

    pub fn remove(&self) -> Result<bool> {
        self.store.remove(&self.key)
    }
}

impl std::fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle").field("key", &self.key).finish()
    }
}

fn read_blob(path: &Path, offset: u64, len: u64) -> std::io::Result<Vec<u8>> {
    let mut file = fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

fn write_blob(path: &Path, offset: u64, data: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).write(true).open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(data)?;
    Ok(())
}

fn remove_blob(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            warn!(error = %e, "Failed to delete cache blob");
        }
    }
}

/// Drops entries whose blob cannot back their stored ranges.
fn validate_entries(index: &mut CacheIndex, blob_dir: &Path) -> bool {
    let before = index.entries.len();

    index.entries.retain(|name, entry| {
        if entry.ranges.is_empty() || entry.key.as_str() != name || entry.blob != entry.key.blob_name()
        {
            warn!(key = %redact_url(name), "Dropping malformed cache entry");
            return false;
        }
        match fs::metadata(blob_dir.join(&entry.blob)) {
            Ok(meta) if meta.len() >= entry.ranges.max_end() => true,
            Ok(meta) => {
                warn!(
                    key = %redact_url(name),
                    blob_len = meta.len(),
                    expected = entry.ranges.max_end(),
                    "Dropping cache entry with truncated blob"
                );
                false
            }
            Err(_) => {
                warn!(key = %redact_url(name), "Dropping cache entry with missing blob");
                false
            }
        }
    });

    index.entries.len() != before
}

fn sweep_orphan_blobs(index: &CacheIndex, blob_dir: &Path) {
    let known: HashSet<&str> = index.entries.values().map(|e| e.blob.as_str()).collect();
    let Ok(dir) = fs::read_dir(blob_dir) else {
        return;
    };

    for file in dir.flatten() {
        let name = file.file_name();
        let name = name.to_string_lossy();
        if !known.contains(name.as_ref()) {
            debug!(blob = %name, "Removing orphan cache blob");
            remove_blob(&file.path());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::ManualClock;
    use std::time::Duration;
    use uuid::Uuid;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("feed-store-{}", Uuid::new_v4()))
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::from_uri(&format!("https://cdn.example.com/{name}.mp4")).unwrap()
    }

    fn open(root: &Path, capacity: u64) -> (Arc<CacheStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_millis(1_000));
        let store = CacheStore::open(root, capacity, clock.clone()).unwrap();
        (Arc::new(store), clock)
    }

    #[test]
    fn test_write_then_read_prefix() {
        let root = temp_root();
        let (store, _) = open(&root, 1024);
        let k = key("a");

        let outcome = store.write(&k, 0, &[7u8; 100]).unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Written {
                new_bytes: 100,
                evicted: vec![]
            }
        );

        let data = store.read_cached(&k, ByteRange::new(0, 50)).unwrap().unwrap();
        assert_eq!(data.len(), 50);

        // Only the stored prefix of a longer request comes back.
        let data = store.read_cached(&k, ByteRange::new(60, 100)).unwrap().unwrap();
        assert_eq!(data.len(), 40);

        assert!(store.read_cached(&k, ByteRange::new(100, 10)).unwrap().is_none());
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_overlap_is_not_double_counted() {
        let root = temp_root();
        let (store, _) = open(&root, 1024);
        let k = key("a");

        store.write(&k, 0, &[1u8; 100]).unwrap();
        store.write(&k, 50, &[1u8; 100]).unwrap();
        assert_eq!(store.size(), 150);
        assert_eq!(
            store.write(&k, 0, &[1u8; 150]).unwrap(),
            WriteOutcome::AlreadyCached
        );
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_next_gap() {
        let root = temp_root();
        let (store, _) = open(&root, 1024);
        let k = key("a");

        assert_eq!(
            store.next_gap(&k, ByteRange::new(0, 100)),
            Some(ByteRange::new(0, 100))
        );

        store.write(&k, 0, &[0u8; 40]).unwrap();
        assert_eq!(
            store.next_gap(&k, ByteRange::new(0, 100)),
            Some(ByteRange::new(40, 60))
        );
        assert_eq!(
            store.next_gap(&k, ByteRange::full()),
            Some(ByteRange::from_offset(40))
        );

        store.set_total_length(&k, 40);
        assert_eq!(store.next_gap(&k, ByteRange::full()), None);
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_lru_eviction_keeps_capacity() {
        let root = temp_root();
        let (store, clock) = open(&root, 300);

        for name in ["a", "b", "c"] {
            store.write(&key(name), 0, &[0u8; 100]).unwrap();
            clock.advance(Duration::from_millis(10));
        }

        // Touch "a" so "b" becomes the oldest.
        store.read_cached(&key("a"), ByteRange::new(0, 1)).unwrap();
        clock.advance(Duration::from_millis(10));

        let outcome = store.write(&key("d"), 0, &[0u8; 100]).unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Written {
                new_bytes: 100,
                evicted: vec![key("b")]
            }
        );
        assert!(store.size() <= store.capacity());
        assert!(!store.contains(&key("b")));
        assert!(store.contains(&key("a")));
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_oversized_write_is_skipped() {
        let root = temp_root();
        let (store, _) = open(&root, 100);
        store.write(&key("a"), 0, &[0u8; 80]).unwrap();

        let outcome = store.write(&key("b"), 0, &[0u8; 101]).unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Skipped {
                required: 101,
                capacity: 100
            }
        );
        assert!(store.contains(&key("a")));
        assert_eq!(store.stats().skipped_writes, 1);
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_reopen_restores_entries() {
        let root = temp_root();
        {
            let (store, _) = open(&root, 1024);
            store.write(&key("a"), 0, &[3u8; 64]).unwrap();
            store.set_total_length(&key("a"), 64);
            store.flush().unwrap();
        }

        let (store, _) = open(&root, 1024);
        assert_eq!(store.size(), 64);
        assert_eq!(store.total_length(&key("a")), Some(64));
        assert_eq!(store.stats().complete_entries, 1);
        let data = store
            .read_cached(&key("a"), ByteRange::full())
            .unwrap()
            .unwrap();
        assert_eq!(&data[..], &[3u8; 64][..]);
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_reopen_drops_truncated_blob_and_orphans() {
        let root = temp_root();
        {
            let (store, _) = open(&root, 1024);
            store.write(&key("a"), 0, &[0u8; 64]).unwrap();
            store.write(&key("b"), 0, &[0u8; 64]).unwrap();
        }
        let blob_a = root.join(BLOB_DIR).join(key("a").blob_name());
        fs::write(&blob_a, [0u8; 10]).unwrap();
        let orphan = root.join(BLOB_DIR).join("orphan.blob");
        fs::write(&orphan, [0u8; 10]).unwrap();

        let (store, _) = open(&root, 1024);
        assert!(!store.contains(&key("a")));
        assert!(store.contains(&key("b")));
        assert_eq!(store.size(), 64);
        assert!(!orphan.exists());
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_missing_blob_reports_corruption() {
        let root = temp_root();
        let (store, _) = open(&root, 1024);
        store.write(&key("a"), 0, &[0u8; 64]).unwrap();
        fs::remove_file(root.join(BLOB_DIR).join(key("a").blob_name())).unwrap();

        let err = store
            .read_cached(&key("a"), ByteRange::new(0, 10))
            .unwrap_err();
        assert!(matches!(err, PlaybackError::CacheCorruption { .. }));
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_remove_and_clear() {
        let root = temp_root();
        let (store, _) = open(&root, 1024);
        store.write(&key("a"), 0, &[0u8; 10]).unwrap();
        store.write(&key("b"), 0, &[0u8; 10]).unwrap();

        assert!(store.remove(&key("a")).unwrap());
        assert!(!store.remove(&key("a")).unwrap());
        assert_eq!(store.size(), 10);

        assert_eq!(store.clear().unwrap(), 1);
        assert_eq!(store.size(), 0);
        assert!(store.is_empty());
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_keys_most_recent_first() {
        let root = temp_root();
        let (store, clock) = open(&root, 1024);
        store.write(&key("a"), 0, &[0u8; 10]).unwrap();
        clock.advance(Duration::from_millis(5));
        store.write(&key("b"), 0, &[0u8; 10]).unwrap();

        assert_eq!(store.keys(), vec![key("b"), key("a")]);
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_range_growth_persists_on_flush() {
        let root = temp_root();
        let (store, _) = open(&root, 1024);
        let k = key("a");

        store.write(&k, 0, &[0u8; 100]).unwrap();
        assert_eq!(CacheIndex::load(&root).unwrap().entries[k.as_str()].size(), 100);

        store.write(&k, 100, &[0u8; 100]).unwrap();
        assert_eq!(CacheIndex::load(&root).unwrap().entries[k.as_str()].size(), 100);

        store.flush().unwrap();
        assert_eq!(CacheIndex::load(&root).unwrap().entries[k.as_str()].size(), 200);
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_released_store_stops_touching_disk() {
        let root = temp_root();
        let (store, _) = open(&root, 1024);
        store.write(&key("a"), 0, &[1u8; 100]).unwrap();
        store.write(&key("a"), 100, &[1u8; 50]).unwrap();

        store.release().unwrap();
        store.release().unwrap();
        assert!(store.is_released());
        assert_eq!(CacheIndex::load(&root).unwrap().entries[key("a").as_str()].size(), 150);

        assert!(store.read_cached(&key("a"), ByteRange::new(0, 10)).unwrap().is_none());
        assert_eq!(
            store.next_gap(&key("a"), ByteRange::new(0, 10)),
            Some(ByteRange::new(0, 10))
        );
        assert_eq!(
            store.write(&key("b"), 0, &[2u8; 10]).unwrap(),
            WriteOutcome::Detached
        );
        assert!(!store.remove(&key("a")).unwrap());
        assert_eq!(store.clear().unwrap(), 0);

        let (reopened, _) = open(&root, 1024);
        reopened.write(&key("c"), 0, &[3u8; 10]).unwrap();
        drop(store);

        let index = CacheIndex::load(&root).unwrap();
        assert!(index.entries.contains_key(key("c").as_str()));
        assert!(!index.entries.contains_key(key("b").as_str()));
        assert!(!root.join(BLOB_DIR).join(key("b").blob_name()).exists());
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_shrunk_capacity_trims_on_open() {
        let root = temp_root();
        {
            let (store, clock) = open(&root, 1024);
            for name in ["a", "b", "c"] {
                store.write(&key(name), 0, &[0u8; 100]).unwrap();
                clock.advance(Duration::from_millis(10));
            }
        }

        let (store, _) = open(&root, 150);
        assert!(store.size() <= 150);
        assert!(store.contains(&key("c")));
        fs::remove_dir_all(root).ok();
    }
}
