//! Synchronization primitives.
//!
//! Async-aware primitives come from `tokio::sync`; cooperative cancellation
//! comes from `tokio_util::sync::CancellationToken`.
//!
//! Prefer these async locks only when a guard must live across an `.await`.
//! State that is mutated synchronously should use a blocking lock instead.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{CancellationToken, Semaphore};
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let permits = Arc::new(Semaphore::new(2));
//!     let _permit = permits.acquire().await.unwrap();
//!
//!     let token = CancellationToken::new();
//!     let child = token.child_token();
//!     token.cancel();
//!     assert!(child.is_cancelled());
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, AcquireError, Barrier, Mutex, MutexGuard, Notify,
    OwnedSemaphorePermit, RwLock, RwLockReadGuard, RwLockWriteGuard, Semaphore, SemaphorePermit,
};

pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
