//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the feed media core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! Every other `core-*` crate depends on this one for its logging
//! conventions, configuration defaults and event types.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{FeedConfig, FeedConfigBuilder};
pub use error::{Error, Result};
pub use events::{CacheEvent, CoreEvent, EventBus, PreloadEvent};
