//! # Preload Task State Machine
//!
//! ```text
//! Pending → Running → Completed
//!    │         ├────→ Failed
//!    └─────────┴────→ Canceled
//! ```
//!
//! State lives in an atomic so the coordinator's publish gate and a
//! concurrent cancel race safely: exactly one of `complete` and `cancel`
//! wins for a running task.

use crate::cache::CacheKey;
use chrono::{DateTime, Utc};
use core_async::sync::CancellationToken;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TaskState {
    Pending = 0,
    Running = 1,
    Completed = 2,
    Canceled = 3,
    Failed = 4,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Pending,
            1 => TaskState::Running,
            2 => TaskState::Completed,
            3 => TaskState::Canceled,
            _ => TaskState::Failed,
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, TaskState::Pending | TaskState::Running)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_live()
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Canceled => "canceled",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One in-flight preload of a feed item.
#[derive(Debug)]
pub struct PreloadTask {
    id: u64,
    key: CacheKey,
    uri: String,
    target_index: usize,
    /// Distance from the current index; scales the start delay.
    offset: usize,
    scheduled_at: DateTime<Utc>,
    state: AtomicU8,
    cancel: CancellationToken,
}

impl PreloadTask {
    pub fn new(
        id: u64,
        key: CacheKey,
        uri: impl Into<String>,
        target_index: usize,
        offset: usize,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            key,
            uri: uri.into(),
            target_index,
            offset,
            scheduled_at,
            state: AtomicU8::new(TaskState::Pending as u8),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_live(&self) -> bool {
        self.state().is_live()
    }

    /// Token fired when the task is canceled.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `Pending → Running`.
    pub fn start(&self) -> bool {
        self.transition(TaskState::Pending, TaskState::Running)
    }

    /// `Running → Completed`. Fails if the task was canceled first.
    pub fn complete(&self) -> bool {
        self.transition(TaskState::Running, TaskState::Completed)
    }

    /// `Running → Failed`.
    pub fn fail(&self) -> bool {
        self.transition(TaskState::Running, TaskState::Failed)
    }

    /// `Pending | Running → Canceled`, then fires the token.
    ///
    /// Returns `false` when the task already reached a terminal state.
    pub fn cancel(&self) -> bool {
        let canceled = self.transition(TaskState::Pending, TaskState::Canceled)
            || self.transition(TaskState::Running, TaskState::Canceled);
        if canceled {
            self.cancel.cancel();
        }
        canceled
    }
}

/// Point-in-time view of a tracked task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: u64,
    pub key: String,
    pub target_index: usize,
    pub state: TaskState,
}

impl From<&PreloadTask> for TaskSnapshot {
    fn from(task: &PreloadTask) -> Self {
        Self {
            id: task.id,
            key: task.key.to_string(),
            target_index: task.target_index,
            state: task.state(),
        }
    }
}
