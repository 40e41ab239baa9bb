//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};

/// Snapshot of the on-disk cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of resources with at least one stored byte
    pub entries: usize,

    /// Resources stored from byte 0 through their known total length
    pub complete_entries: usize,

    /// Sum of stored range lengths
    pub total_bytes: u64,

    /// Configured capacity
    pub capacity_bytes: u64,

    /// Evictions since the store was opened
    pub evictions: u64,

    /// Writes skipped because a single resource exceeds the capacity
    pub skipped_writes: u64,

    /// Timestamp (unix millis) when stats were calculated
    pub calculated_at: i64,
}

impl CacheStats {
    /// Cache usage as a percentage of capacity.
    pub fn usage_percentage(&self) -> f64 {
        if self.capacity_bytes == 0 {
            return 0.0;
        }

        (self.total_bytes as f64 / self.capacity_bytes as f64) * 100.0
    }

    /// Returns true if the cache is near capacity (>90%).
    pub fn is_near_capacity(&self) -> bool {
        self.usage_percentage() > 90.0
    }

    pub fn free_bytes(&self) -> u64 {
        self.capacity_bytes.saturating_sub(self.total_bytes)
    }

    /// Returns average bytes per entry.
    pub fn average_entry_size(&self) -> u64 {
        if self.entries == 0 {
            0
        } else {
            self.total_bytes / self.entries as u64
        }
    }

    pub fn size_display(&self) -> String {
        format_size_mb(self.total_bytes)
    }
}

/// Formats a byte count as megabytes with two decimals, e.g. `"12.34 MB"`.
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
