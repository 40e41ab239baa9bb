//! # Feed Media Playback Core
//!
//! Disk cache and predictive preloading for a vertical short-video feed.
//!
//! ## Overview
//!
//! This crate handles:
//! - A persistent, size-bounded byte-range cache ([`cache`])
//! - Data sources that read through the cache or straight from the network ([`source`])
//! - Lookahead preloading around the current feed position ([`preload`])
//!
//! ## Components
//!
//! ```text
//! CacheStore ← CachingDataSourceFactory ← PreloadCoordinator → MediaSourceRegistry
//! ```
//!
//! The UI reports its position with
//! [`PreloadCoordinator::report_position`]; playback asks the
//! [`MediaSourceRegistry`] first and falls back to
//! [`CachingDataSourceFactory::create`].

pub mod cache;
pub mod error;
pub mod preload;
pub mod source;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cache::{CacheKey, CacheLifecycle, CacheMode, CacheStore, WriteOutcome};
pub use error::{PlaybackError, Result};
pub use preload::{
    MediaSourceRegistry, PreloadConfig, PreloadCoordinator, PreloadedSource, WindowReport,
};
pub use source::{CachingDataSourceFactory, DataSource, DataSourceOptions};
