//! Workspace façade crate.
//!
//! Host applications depend on `feed-media-workspace` and get the composition
//! root (`core-service`) plus the playback cache types without wiring each
//! crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_playback as playback;
#[cfg(feature = "desktop-shims")]
pub use core_service::{bootstrap, CoreError, FeedMediaService, Result};
