//! Runtime abstraction layer for the feed media core.
//!
//! All `core-*` and `bridge-*` crates depend on this crate instead of reaching
//! for Tokio directly, so the executor choice lives in one place.
//!
//! # Modules
//!
//! - `task`: Task spawning and execution
//! - `time`: Sleep, timeouts, durations and instants
//! - `sync`: Synchronization primitives, channels and cancellation tokens
//! - `runtime`: Helpers for driving futures from synchronous code
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};

/// Waits for the first of several futures, like `tokio::select!`.
pub use tokio::select;
