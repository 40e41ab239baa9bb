//! Runtime utilities that abstract over the underlying async executor.
//!
//! We wrap Tokio's runtime primitives so that downstream crates never need to
//! depend on Tokio directly.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion using a lightweight
/// current-thread runtime.
///
/// # Panics
///
/// Panics if the runtime cannot be built or when called from inside another
/// runtime.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}

/// Runs the provided future on a small multi-threaded runtime.
///
/// Used by `#[core_async::test]` and `#[core_async::main]`, where spawned
/// background work must make progress while the entry future awaits.
///
/// # Panics
///
/// Panics if the runtime cannot be built or when called from inside another
/// runtime.
pub fn block_on_multi_thread<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on_multi_thread: failed to build Tokio runtime")
        .block_on(future)
}
