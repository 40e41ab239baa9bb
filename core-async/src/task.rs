//! Task spawning and execution.
//!
//! Background preload work is spawned through [`spawn`]; blocking disk work
//! that must not stall an executor thread goes through [`spawn_blocking`].
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let handle = task::spawn(async { 42 });
//!     assert_eq!(handle.await.unwrap(), 42);
//!
//!     let blocking = task::spawn_blocking(|| 7);
//!     assert_eq!(blocking.await.unwrap(), 7);
//! }
//! ```

pub use tokio::task::{spawn_blocking, yield_now, AbortHandle, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the current runtime.
///
/// The task may run on a different worker thread and keeps running even if
/// the returned handle is dropped.
///
/// # Panics
///
/// Panics when called outside of a runtime context.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Returns `true` when called from within a runtime context.
pub fn in_runtime() -> bool {
    tokio::runtime::Handle::try_current().is_ok()
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
