//! # Media Cache Module
//!
//! Persistent, size-bounded byte-range cache for feed videos.
//!
//! ## Overview
//!
//! - [`CacheKey`] derives a stable identity from a media URI
//! - [`CacheStore`] stores byte ranges per key in sparse blob files and keeps
//!   the total under its capacity with LRU eviction
//! - [`CacheLifecycle`] owns the store and falls back to pass-through mode
//!   when it cannot be opened
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     CacheLifecycle                     │
//! │  - initialize() / release()            │
//! │  - clear_cache()                       │
//! └────────┬───────────────────────────────┘
//!          │
//!          └──> CacheStore
//!                 ├──> CacheIndex (index.json)
//!                 └──> blobs/<sha256>.blob
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheKey, CacheLifecycle, CacheMode};
//! use bridge_traits::http::ByteRange;
//!
//! let lifecycle = CacheLifecycle::default();
//! if lifecycle.initialize(&cache_dir, 500 * 1024 * 1024) == CacheMode::Cached {
//!     let store = lifecycle.store().unwrap();
//!     let handle = store.handle(CacheKey::from_uri(uri)?);
//!     let prefix = handle.read_cached(ByteRange::new(0, 64 * 1024))?;
//! }
//! ```

pub mod config;
pub mod index;
pub mod key;
pub mod lifecycle;
pub mod range_set;
pub mod stats;
pub mod store;

pub use config::{CacheConfig, DEFAULT_CAPACITY_BYTES};
pub use index::{CacheEntry, CacheIndex};
pub use key::CacheKey;
pub use lifecycle::{CacheLifecycle, CacheMode};
pub use range_set::ByteRangeSet;
pub use stats::{format_size_mb, CacheStats};
pub use store::{CacheHandle, CacheStore, WriteOutcome};
