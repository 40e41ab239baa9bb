//! # Event Bus System
//!
//! Typed events for the media cache and preloading core, broadcast over
//! `tokio::sync::broadcast` (through `core_async::sync`).
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: `CoreEvent` wrapping `CacheEvent` and `PreloadEvent`
//! - **EventBus**: Central broadcast channel for publishing events
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   emit    ┌───────────┐
//! │ CacheLifecycle ├──────────>│           │   subscribe   ┌────────────┐
//! └────────────────┘           │ EventBus  ├──────────────>│ Subscriber │
//! ┌────────────────┐   emit    │ (broadcast│               └────────────┘
//! │ Preloader      ├──────────>│  channel) │
//! └────────────────┘           └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PreloadEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Preload(PreloadEvent::Canceled {
//!         key: "https://cdn.example.com/v/1.mp4".to_string(),
//!         index: 3,
//!     }))
//!     .ok();
//!
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting without subscribers returns an error that publishers ignore.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// On-disk cache lifecycle and housekeeping
    Cache(CacheEvent),
    /// Lookahead preloading
    Preload(PreloadEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Preload(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Cache(CacheEvent::PassThrough { .. }) => EventSeverity::Warning,
            CoreEvent::Preload(PreloadEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::Initialized { .. }) => EventSeverity::Info,
            CoreEvent::Cache(CacheEvent::Cleared { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events emitted by the cache lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// The on-disk cache opened successfully.
    Initialized {
        capacity_bytes: u64,
        size_bytes: u64,
        entries: usize,
    },
    /// Initialization failed; playback streams from the network only.
    PassThrough {
        reason: String,
        /// The cache directory was wiped so the next start recovers.
        wiped: bool,
    },
    /// A whole resource was evicted to stay within capacity.
    Evicted { key: String, bytes_freed: u64 },
    /// All entries were removed on request.
    Cleared { entries_removed: usize },
    /// The cache was flushed and closed.
    Released,
}

impl CacheEvent {
    pub fn description(&self) -> &str {
        match self {
            CacheEvent::Initialized { .. } => "Media cache initialized",
            CacheEvent::PassThrough { .. } => "Media cache unavailable, streaming only",
            CacheEvent::Evicted { .. } => "Cached resource evicted",
            CacheEvent::Cleared { .. } => "Media cache cleared",
            CacheEvent::Released => "Media cache released",
        }
    }
}

// ============================================================================
// Preload Events
// ============================================================================

/// Events emitted by the preload coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PreloadEvent {
    /// A preload task was created for an upcoming item.
    Scheduled {
        key: String,
        index: usize,
        delay_ms: u64,
    },
    /// The item was warmed and published to the registry.
    Completed {
        key: String,
        index: usize,
        prefetched_bytes: u64,
    },
    /// The item left the lookahead window before finishing.
    Canceled { key: String, index: usize },
    /// The preload failed; it will not be retried.
    Failed {
        key: String,
        index: usize,
        message: String,
    },
    /// A preloaded source was dropped from the registry.
    Evicted { key: String },
    /// All preloads were canceled and the registry emptied.
    Cleared {
        tasks_canceled: usize,
        sources_dropped: usize,
    },
}

impl PreloadEvent {
    pub fn description(&self) -> &str {
        match self {
            PreloadEvent::Scheduled { .. } => "Preload scheduled",
            PreloadEvent::Completed { .. } => "Preload completed",
            PreloadEvent::Canceled { .. } => "Preload canceled",
            PreloadEvent::Failed { .. } => "Preload failed",
            PreloadEvent::Evicted { .. } => "Preloaded source evicted",
            PreloadEvent::Cleared { .. } => "All preloads cleared",
        }
    }

    /// Media key the event refers to, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            PreloadEvent::Scheduled { key, .. }
            | PreloadEvent::Completed { key, .. }
            | PreloadEvent::Canceled { key, .. }
            | PreloadEvent::Failed { key, .. }
            | PreloadEvent::Evicted { key } => Some(key),
            PreloadEvent::Cleared { .. } => None,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for broadcasting events to multiple subscribers.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber that falls behind by more than `capacity` events receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduled(key: &str, index: usize) -> CoreEvent {
        CoreEvent::Preload(PreloadEvent::Scheduled {
            key: key.to_string(),
            index,
            delay_ms: 500,
        })
    }

    #[core_async::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[core_async::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(scheduled("a", 1)).is_err());
    }

    #[core_async::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = scheduled("https://cdn.example.com/1.mp4", 1);
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[core_async::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(scheduled("a", i)).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_severity() {
        let failed = CoreEvent::Preload(PreloadEvent::Failed {
            key: "a".to_string(),
            index: 1,
            message: "timeout".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Warning);
        assert_eq!(scheduled("a", 1).severity(), EventSeverity::Debug);
        assert_eq!(
            CoreEvent::Cache(CacheEvent::PassThrough {
                reason: "corrupt index".to_string(),
                wiped: true,
            })
            .severity(),
            EventSeverity::Warning
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Preload(PreloadEvent::Completed {
            key: "k".to_string(),
            index: 2,
            prefetched_bytes: 1024,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Preload\""));
        assert!(json.contains("\"event\":\"Completed\""));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_preload_event_key() {
        assert_eq!(
            PreloadEvent::Evicted {
                key: "k".to_string()
            }
            .key(),
            Some("k")
        );
        assert_eq!(
            PreloadEvent::Cleared {
                tasks_canceled: 1,
                sources_dropped: 2
            }
            .key(),
            None
        );
    }
}
