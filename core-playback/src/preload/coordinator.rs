//! # Preload Coordinator
//!
//! Keeps the next few feed items warm while the user scrolls.
//!
//! ## Flow
//!
//! ```text
//! report_position(i, keys)
//!   ├─ cancel tasks whose key left [i+1 ..= i+preload_count]
//!   ├─ skip keys with a live task or a registry entry
//!   ├─ spawn a task per remaining key (delay = offset × base_delay)
//!   └─ trim the registry to 2 × preload_count, sparing the window
//!
//! task: sleep → semaphore permit → factory.create → read prefetch bytes
//!       → publish gate (Running → Completed under the coordination mutex)
//! ```
//!
//! `report_position` only schedules; it never awaits. All bookkeeping
//! happens under a single mutex so a pass, a task's publish and
//! `clear_all` never interleave. A canceled task loses the publish gate and
//! its result is dropped.

use crate::cache::CacheKey;
use crate::error::{PlaybackError, Result};
use crate::preload::config::PreloadConfig;
use crate::preload::registry::{MediaSourceRegistry, PreloadedSource};
use crate::preload::task::{PreloadTask, TaskSnapshot, TaskState};
use crate::source::{CachingDataSourceFactory, FetchStatsSnapshot};
use bridge_traits::http::ByteRange;
use chrono::Utc;
use core_async::sync::Semaphore;
use core_runtime::events::{CoreEvent, EventBus, PreloadEvent};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What one `report_position` pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowReport {
    pub current_index: usize,
    /// Keys inside the lookahead window, nearest first.
    pub window: Vec<String>,
    pub scheduled: Vec<String>,
    pub already_running: Vec<String>,
    pub already_preloaded: Vec<String>,
    pub canceled: Vec<String>,
    /// Blank references inside the window.
    pub skipped_invalid: usize,
    /// Registry entries dropped by the retention bound.
    pub evicted: Vec<String>,
}

/// Result of [`PreloadCoordinator::clear_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub tasks_canceled: usize,
    pub sources_dropped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreloadStats {
    pub scheduled: u64,
    pub completed: u64,
    pub canceled: u64,
    pub failed: u64,
    pub evicted: u64,
    pub active_tasks: usize,
    pub preloaded: usize,
    pub fetch: FetchStatsSnapshot,
}

#[derive(Default)]
struct Counters {
    scheduled: AtomicU64,
    completed: AtomicU64,
    canceled: AtomicU64,
    failed: AtomicU64,
    evicted: AtomicU64,
}

#[derive(Default)]
struct CoordinatorState {
    tasks: HashMap<String, Arc<PreloadTask>>,
    /// Keys of the most recent window.
    window: HashSet<String>,
}

struct WindowTarget {
    key: CacheKey,
    uri: String,
    index: usize,
    offset: usize,
}

struct Inner {
    config: PreloadConfig,
    factory: CachingDataSourceFactory,
    registry: Arc<MediaSourceRegistry>,
    permits: Arc<Semaphore>,
    state: Mutex<CoordinatorState>,
    next_task_id: AtomicU64,
    counters: Counters,
    event_bus: Option<EventBus>,
}

/// Schedules, deduplicates and cancels preloads around the current index.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct PreloadCoordinator {
    inner: Arc<Inner>,
}

impl PreloadCoordinator {
    pub fn new(
        config: PreloadConfig,
        factory: CachingDataSourceFactory,
        registry: Arc<MediaSourceRegistry>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            inner: Arc::new(Inner {
                config,
                factory,
                registry,
                permits,
                state: Mutex::new(CoordinatorState::default()),
                next_task_id: AtomicU64::new(1),
                counters: Counters::default(),
                event_bus: None,
            }),
        }
    }

    /// Attach an event bus. Must be called before the coordinator is cloned.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.event_bus = Some(event_bus),
            None => warn!("Event bus attached after the coordinator was shared, ignoring"),
        }
        self
    }

    pub fn config(&self) -> &PreloadConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<MediaSourceRegistry> {
        &self.inner.registry
    }

    pub fn factory(&self) -> &CachingDataSourceFactory {
        &self.inner.factory
    }

    /// Moves the lookahead window to follow `current_index`.
    ///
    /// Cancels preloads that fell out of the window, then schedules the
    /// missing ones. Returns immediately; fetching happens on spawned tasks.
    #[instrument(skip(self, media_keys), fields(items = media_keys.len()))]
    pub fn report_position(&self, current_index: usize, media_keys: &[String]) -> WindowReport {
        let inner = &self.inner;
        let mut report = WindowReport {
            current_index,
            ..WindowReport::default()
        };

        let targets = self.window_targets(current_index, media_keys, &mut report);
        let window: HashSet<String> = targets.iter().map(|t| t.key.to_string()).collect();
        report.window = targets.iter().map(|t| t.key.to_string()).collect();

        let can_spawn = core_async::task::in_runtime();
        if !can_spawn && !targets.is_empty() {
            warn!("No async runtime available, preloads will not be scheduled");
        }

        let mut state = inner.state.lock();

        // Cancellations first, so a key re-entering the window below gets a
        // fresh task instead of a dying one.
        let stale: Vec<String> = state
            .tasks
            .keys()
            .filter(|key| !window.contains(*key))
            .cloned()
            .collect();
        for key in stale {
            let Some(task) = state.tasks.remove(&key) else {
                continue;
            };
            if task.cancel() {
                debug!(key = %redact_url(&key), index = task.target_index(), "Preload canceled");
                inner.counters.canceled.fetch_add(1, Ordering::Relaxed);
                inner.emit(PreloadEvent::Canceled {
                    key: key.clone(),
                    index: task.target_index(),
                });
                report.canceled.push(key);
            }
        }

        for target in targets {
            let key = target.key.to_string();

            match state.tasks.get(&key).map(|task| task.is_live()) {
                Some(true) => {
                    report.already_running.push(key);
                    continue;
                }
                Some(false) => {
                    state.tasks.remove(&key);
                }
                None => {}
            }

            if inner.registry.touch(&target.key) {
                report.already_preloaded.push(key);
                continue;
            }

            if !can_spawn {
                continue;
            }

            let task = Arc::new(PreloadTask::new(
                inner.next_task_id.fetch_add(1, Ordering::Relaxed),
                target.key,
                target.uri,
                target.index,
                target.offset,
                Utc::now(),
            ));
            task.start();
            state.tasks.insert(key.clone(), Arc::clone(&task));

            let delay = inner.config.delay_for(target.offset);
            debug!(
                key = %redact_url(&key),
                index = target.index,
                delay_ms = delay.as_millis() as u64,
                "Preload scheduled"
            );
            inner.counters.scheduled.fetch_add(1, Ordering::Relaxed);
            inner.emit(PreloadEvent::Scheduled {
                key: key.clone(),
                index: target.index,
                delay_ms: delay.as_millis() as u64,
            });

            let task_inner = Arc::clone(inner);
            core_async::task::spawn(async move {
                task_inner.run_task(task).await;
            });

            report.scheduled.push(key);
        }

        report.evicted = inner.enforce_retention(&window);
        state.window = window;

        report
    }

    /// Cancels every task and empties the registry.
    #[instrument(skip(self))]
    pub fn clear_all(&self) -> ClearReport {
        let inner = &self.inner;
        let mut state = inner.state.lock();

        let mut tasks_canceled = 0;
        for (_, task) in state.tasks.drain() {
            if task.cancel() {
                tasks_canceled += 1;
            }
        }
        state.window.clear();
        let sources_dropped = inner.registry.clear();
        drop(state);

        inner
            .counters
            .canceled
            .fetch_add(tasks_canceled as u64, Ordering::Relaxed);
        info!(tasks_canceled, sources_dropped, "Preloads cleared");
        inner.emit(PreloadEvent::Cleared {
            tasks_canceled,
            sources_dropped,
        });

        ClearReport {
            tasks_canceled,
            sources_dropped,
        }
    }

    /// Warmed source for `uri`, if one is ready. Never fetches.
    pub fn preloaded_source(&self, uri: &str) -> Option<PreloadedSource> {
        let key = CacheKey::from_uri(uri).ok()?;
        self.inner.registry.get(&key)
    }

    pub fn is_preloaded(&self, uri: &str) -> bool {
        CacheKey::from_uri(uri)
            .map(|key| self.inner.registry.contains(&key))
            .unwrap_or(false)
    }

    pub fn preloaded_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Tasks still pending or running.
    pub fn active_task_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .tasks
            .values()
            .filter(|task| task.is_live())
            .count()
    }

    /// Tracked tasks ordered by target index.
    pub fn task_snapshot(&self) -> Vec<TaskSnapshot> {
        let state = self.inner.state.lock();
        let mut snapshot: Vec<TaskSnapshot> = state
            .tasks
            .values()
            .map(|task| TaskSnapshot::from(task.as_ref()))
            .collect();
        snapshot.sort_by_key(|task| task.target_index);
        snapshot
    }

    pub fn task_state(&self, uri: &str) -> Option<TaskState> {
        let key = CacheKey::from_uri(uri).ok()?;
        self.inner
            .state
            .lock()
            .tasks
            .get(key.as_str())
            .map(|task| task.state())
    }

    pub fn stats(&self) -> PreloadStats {
        let counters = &self.inner.counters;
        PreloadStats {
            scheduled: counters.scheduled.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            canceled: counters.canceled.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            evicted: counters.evicted.load(Ordering::Relaxed),
            active_tasks: self.active_task_count(),
            preloaded: self.preloaded_count(),
            fetch: self.inner.factory.stats(),
        }
    }

    fn window_targets(
        &self,
        current_index: usize,
        media_keys: &[String],
        report: &mut WindowReport,
    ) -> Vec<WindowTarget> {
        let mut targets: Vec<WindowTarget> = Vec::new();

        for offset in 1..=self.inner.config.preload_count {
            let Some(index) = current_index.checked_add(offset) else {
                break;
            };
            let Some(uri) = media_keys.get(index) else {
                break;
            };

            match CacheKey::from_uri(uri) {
                Ok(key) => {
                    if targets.iter().any(|t| t.key == key) {
                        continue;
                    }
                    targets.push(WindowTarget {
                        key,
                        uri: uri.trim().to_string(),
                        index,
                        offset,
                    });
                }
                Err(_) => {
                    warn!(index, "Skipping blank media reference");
                    report.skipped_invalid += 1;
                }
            }
        }

        targets
    }
}

impl Inner {
    async fn run_task(self: Arc<Self>, task: Arc<PreloadTask>) {
        match self.warm(&task).await {
            Ok(preloaded) => self.publish(&task, preloaded),
            Err(e) if e.is_cancelled() => {
                debug!(key = %redact_url(task.key().as_str()), "Preload stopped by cancellation");
                self.untrack(&task);
            }
            Err(e) => {
                if task.fail() {
                    warn!(
                        key = %redact_url(task.key().as_str()),
                        index = task.target_index(),
                        error = %e,
                        "Preload failed"
                    );
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    self.emit(PreloadEvent::Failed {
                        key: task.key().to_string(),
                        index: task.target_index(),
                        message: e.to_string(),
                    });
                }
                self.untrack(&task);
            }
        }
    }

    async fn warm(&self, task: &PreloadTask) -> Result<PreloadedSource> {
        let cancel = task.cancellation_token();
        let delay = self.config.delay_for(task.offset());

        if !delay.is_zero() {
            core_async::select! {
                _ = cancel.cancelled() => return Err(PlaybackError::Cancelled),
                _ = core_async::time::sleep(delay) => {}
            }
        }

        let _permit = core_async::select! {
            _ = cancel.cancelled() => return Err(PlaybackError::Cancelled),
            permit = Arc::clone(&self.permits).acquire_owned() => permit
                .map_err(|_| PlaybackError::Internal("preload semaphore closed".to_string()))?,
        };

        let source = self.factory.create(task.uri())?;
        let prefetched = source
            .read_with_cancel(ByteRange::new(0, self.config.prefetch_bytes), cancel)
            .await?;
        let total_length = source.content_length(cancel).await?;

        Ok(PreloadedSource {
            key: task.key().clone(),
            target_index: task.target_index(),
            source,
            prefetched_bytes: prefetched.len() as u64,
            total_length,
            completed_at: Utc::now(),
        })
    }

    /// Publish gate: the registry only sees results of tasks that were still
    /// running when they finished.
    fn publish(&self, task: &PreloadTask, preloaded: PreloadedSource) {
        let mut state = self.state.lock();

        if !task.complete() {
            debug!(
                key = %redact_url(task.key().as_str()),
                state = %task.state(),
                "Discarding preload result"
            );
            return;
        }

        let prefetched_bytes = preloaded.prefetched_bytes;
        self.registry.put(preloaded);
        if state
            .tasks
            .get(task.key().as_str())
            .is_some_and(|tracked| tracked.id() == task.id())
        {
            state.tasks.remove(task.key().as_str());
        }
        self.enforce_retention(&state.window);
        drop(state);

        debug!(
            key = %redact_url(task.key().as_str()),
            index = task.target_index(),
            prefetched_bytes,
            "Preload completed"
        );
        self.counters.completed.fetch_add(1, Ordering::Relaxed);
        self.emit(PreloadEvent::Completed {
            key: task.key().to_string(),
            index: task.target_index(),
            prefetched_bytes,
        });
    }

    fn untrack(&self, task: &PreloadTask) {
        let mut state = self.state.lock();
        if state
            .tasks
            .get(task.key().as_str())
            .is_some_and(|tracked| tracked.id() == task.id())
        {
            state.tasks.remove(task.key().as_str());
        }
    }

    /// Caller holds the coordination mutex.
    fn enforce_retention(&self, window: &HashSet<String>) -> Vec<String> {
        let evicted = self
            .registry
            .evict_beyond(self.config.retention_limit(), window);
        for key in &evicted {
            debug!(key = %redact_url(key), "Preloaded source evicted");
            self.emit(PreloadEvent::Evicted { key: key.clone() });
        }
        self.counters
            .evicted
            .fetch_add(evicted.len() as u64, Ordering::Relaxed);
        evicted
    }

    fn emit(&self, event: PreloadEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Preload(event));
        }
    }
}
