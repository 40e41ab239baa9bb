//! Integration tests for the runtime façade.

use core_async::{sync, task, time};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[core_async::test]
async fn spawned_task_returns_value() {
    let handle = task::spawn(async { 42 });
    assert_eq!(handle.await.unwrap(), 42);
}

#[core_async::test]
async fn spawn_blocking_runs_off_executor() {
    let handle = task::spawn_blocking(|| {
        std::thread::sleep(std::time::Duration::from_millis(10));
        100
    });
    assert_eq!(handle.await.unwrap(), 100);
}

#[core_async::test]
async fn sleep_waits_at_least_requested_duration() {
    let start = time::Instant::now();
    time::sleep(time::Duration::from_millis(30)).await;
    assert!(start.elapsed() >= time::Duration::from_millis(30));
}

#[core_async::test]
async fn timeout_expires_for_slow_future() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(200)).await;
        42
    })
    .await;

    assert!(result.is_err());
}

#[core_async::test]
async fn semaphore_bounds_concurrency() {
    let permits = Arc::new(sync::Semaphore::new(2));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let permits = permits.clone();
        let running = running.clone();
        let peak = peak.clone();
        handles.push(task::spawn(async move {
            let _permit = permits.acquire_owned().await.unwrap();
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            time::sleep(time::Duration::from_millis(10)).await;
            running.fetch_sub(1, Ordering::SeqCst);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[core_async::test]
async fn cancellation_token_wakes_waiters() {
    let token = sync::CancellationToken::new();
    let child = token.child_token();

    let waiter = task::spawn(async move {
        child.cancelled().await;
        "cancelled"
    });

    time::sleep(time::Duration::from_millis(5)).await;
    token.cancel();

    assert_eq!(waiter.await.unwrap(), "cancelled");
}

#[core_async::test]
async fn select_picks_cancellation_over_sleep() {
    let token = sync::CancellationToken::new();
    token.cancel();

    let outcome = core_async::select! {
        _ = token.cancelled() => "cancelled",
        _ = time::sleep(time::Duration::from_secs(5)) => "slept",
    };

    assert_eq!(outcome, "cancelled");
}

#[core_async::test]
async fn broadcast_delivers_to_all_subscribers() {
    let (tx, mut rx1) = sync::broadcast::channel(8);
    let mut rx2 = tx.subscribe();

    tx.send(7u32).unwrap();

    assert_eq!(rx1.recv().await.unwrap(), 7);
    assert_eq!(rx2.recv().await.unwrap(), 7);
}

#[test]
fn block_on_drives_future_from_sync_code() {
    let value = core_async::runtime::block_on(async {
        time::sleep(time::Duration::from_millis(1)).await;
        5
    });
    assert_eq!(value, 5);
}
