//! Time-related abstractions.
//!
//! Re-exports Tokio's timer primitives together with the standard duration
//! and instant types so callers only import from one place.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, timeout, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(5)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(5));
//!
//!     let result = timeout(Duration::from_millis(50), async { 1 }).await;
//!     assert_eq!(result.unwrap(), 1);
//! }
//! ```

pub use tokio::time::{error::Elapsed, interval, sleep, sleep_until, timeout, Interval, Sleep, Timeout};

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
