//! # Predictive Preloading
//!
//! [`PreloadCoordinator`] follows the feed position and warms the next few
//! items; finished preloads land in the [`MediaSourceRegistry`], where
//! playback looks first.

pub mod config;
pub mod coordinator;
pub mod registry;
pub mod task;

pub use config::PreloadConfig;
pub use coordinator::{ClearReport, PreloadCoordinator, PreloadStats, WindowReport};
pub use registry::{MediaSourceRegistry, PreloadedSource};
pub use task::{PreloadTask, TaskSnapshot, TaskState};
