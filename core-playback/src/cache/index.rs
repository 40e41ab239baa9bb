//! Persisted cache index (`root/index.json`).

use crate::cache::key::CacheKey;
use crate::cache::range_set::ByteRangeSet;
use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const INDEX_FILE: &str = "index.json";
pub const INDEX_VERSION: u32 = 1;

/// Metadata for one cached resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub blob: String,
    pub ranges: ByteRangeSet,
    pub total_length: Option<u64>,
    pub last_access_ms: i64,
    /// Tie-breaker for entries touched within the same millisecond.
    #[serde(default)]
    pub access_seq: u64,
    pub created_at_ms: i64,
}

impl CacheEntry {
    pub fn new(key: CacheKey, now_ms: i64, seq: u64) -> Self {
        Self {
            blob: key.blob_name(),
            key,
            ranges: ByteRangeSet::new(),
            total_length: None,
            last_access_ms: now_ms,
            access_seq: seq,
            created_at_ms: now_ms,
        }
    }

    /// Bytes this entry occupies on disk.
    pub fn size(&self) -> u64 {
        self.ranges.total()
    }

    pub fn touch(&mut self, now_ms: i64, seq: u64) {
        self.last_access_ms = now_ms;
        self.access_seq = seq;
    }

    /// True once every byte up to the known total length is stored.
    pub fn is_complete(&self) -> bool {
        match self.total_length {
            Some(total) => self.ranges.contiguous_from(0) >= total,
            None => false,
        }
    }

    pub(crate) fn lru_rank(&self) -> (i64, u64) {
        (self.last_access_ms, self.access_seq)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheIndex {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
}

impl Default for CacheIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            entries: HashMap::new(),
        }
    }
}

impl CacheIndex {
    /// Loads the index from `root`. A missing file yields an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::CorruptIndex`] if the file exists but cannot
    /// be parsed.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(INDEX_FILE);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        let index: CacheIndex =
            serde_json::from_slice(&raw).map_err(|e| PlaybackError::CorruptIndex {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if index.version != INDEX_VERSION {
            return Err(PlaybackError::CorruptIndex {
                path: path.display().to_string(),
                reason: format!("unsupported index version {}", index.version),
            });
        }

        Ok(index)
    }

    /// Writes the index atomically (temp file + rename).
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(INDEX_FILE);
        let tmp = root.join(format!("{INDEX_FILE}.tmp"));
        let raw = serde_json::to_vec(self)?;
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn total_size(&self) -> u64 {
        self.entries.values().map(CacheEntry::size).sum()
    }

    pub fn max_seq(&self) -> u64 {
        self.entries.values().map(|e| e.access_seq).max().unwrap_or(0)
    }
}
