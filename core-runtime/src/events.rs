//! # Event Bus System
//!
//! Broadcast notifications for observers that cannot hold a direct delegate
//! reference to the player (widgets, analytics, a second UI surface).
//!
//! ## Overview
//!
//! Every delegate callback the player issues is mirrored here as a
//! [`CoreEvent`]. The bus is built on `tokio::sync::broadcast`:
//! - **Event Types**: strongly-typed enums per domain (playback, offline cache)
//! - **EventBus**: central broadcast channel
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! ```text
//! ┌──────────────┐   emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ Control loop ├─────────>│ EventBus  ├────────────>│ Subscriber │
//! └──────────────┘          │ (broadcast│             └────────────┘
//! ┌──────────────┐   emit   │  channel) │  subscribe  ┌────────────┐
//! │ Offline cache├─────────>│           ├────────────>│ Subscriber │
//! └──────────────┘          └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::StateChanged {
//!     item_id: Some("track-1".to_string()),
//!     from: "stopped".to_string(),
//!     to: "buffering".to_string(),
//! }))
//! .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Playback state changed");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; keep reading.
//! - **`RecvError::Closed`**: every sender is gone, the player shut down.
//!
//! Emitting with no subscribers returns an error; publishers in the core
//! ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Progress events arrive about once a second per player, so a hundred slots
/// absorb bursts (item change + state changes + metadata) comfortably.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback state machine notifications
    Playback(PlaybackEvent),
    /// Offline caching side-effect notifications
    Cache(CacheEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error {
                recoverable: false, ..
            }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::CachingFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::StateChanged { .. })
            | CoreEvent::Playback(PlaybackEvent::WillStartPlaying { .. })
            | CoreEvent::Cache(CacheEvent::ItemCached { .. }) => EventSeverity::Info,
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
// Playback Events
// ============================================================================

/// Events mirroring the player delegate callbacks.
///
/// States are carried as their stable lowercase labels (`"buffering"`,
/// `"failed:retry_exhausted"`, ...) so subscribers do not need the playback
/// crate's types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A new item is about to be loaded.
    WillStartPlaying {
        item_id: String,
        title: Option<String>,
    },
    /// The playback state machine transitioned.
    StateChanged {
        /// Current item after the transition, if any.
        item_id: Option<String>,
        from: String,
        to: String,
    },
    /// Playback position advanced (or was moved by a seek).
    Progressed {
        item_id: String,
        position_ms: u64,
        duration_ms: Option<u64>,
    },
    /// The current item's duration became known.
    DurationChanged { item_id: String, duration_ms: u64 },
    /// The current item's display metadata changed.
    MetadataUpdated {
        item_id: String,
        title: Option<String>,
        artist: Option<String>,
        album: Option<String>,
    },
    /// The queue contents or position changed.
    QueueChanged {
        length: usize,
        current_index: Option<usize>,
    },
    /// A playback failure was observed.
    Error {
        item_id: Option<String>,
        message: String,
        /// Whether the player is still trying to recover.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::WillStartPlaying { .. } => "Item will start playing",
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::Progressed { .. } => "Playback progressed",
            PlaybackEvent::DurationChanged { .. } => "Item duration changed",
            PlaybackEvent::MetadataUpdated { .. } => "Item metadata updated",
            PlaybackEvent::QueueChanged { .. } => "Queue changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

/// Outcome of the opportunistic offline write-through after a download.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// The item's offline document was persisted.
    ItemCached { item_id: String, local_path: String },
    /// The download could not be recorded (invalid identity or path).
    CachingSkipped {
        item_id: Option<String>,
        reason: String,
    },
    /// Persisting the document failed.
    CachingFailed { item_id: String, message: String },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::ItemCached { .. } => "Item cached for offline playback",
            CacheEvent::CachingSkipped { .. } => "Offline caching skipped",
            CacheEvent::CachingFailed { .. } => "Offline caching failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every clone publishes into the same
/// channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified per-subscriber buffer.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
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
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(100);
/// let cache_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Cache(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn state_changed(from: &str, to: &str) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::StateChanged {
            item_id: Some("track-1".to_string()),
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(state_changed("stopped", "buffering")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = state_changed("buffering", "playing");
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|event| matches!(event, CoreEvent::Cache(_)));

        bus.emit(state_changed("stopped", "buffering")).ok();
        let cached = CoreEvent::Cache(CacheEvent::ItemCached {
            item_id: "track-1".to_string(),
            local_path: "track-1.mp3".to_string(),
        });
        bus.emit(cached.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), cached);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for position in 0..5u64 {
            bus.emit(CoreEvent::Playback(PlaybackEvent::Progressed {
                item_id: "track-1".to_string(),
                position_ms: position * 1000,
                duration_ms: Some(180_000),
            }))
            .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let fatal = CoreEvent::Playback(PlaybackEvent::Error {
            item_id: None,
            message: "retry exhausted".to_string(),
            recoverable: false,
        });
        assert_eq!(fatal.severity(), EventSeverity::Error);

        let transient = CoreEvent::Playback(PlaybackEvent::Error {
            item_id: Some("track-1".to_string()),
            message: "stalled".to_string(),
            recoverable: true,
        });
        assert_eq!(transient.severity(), EventSeverity::Warning);

        assert_eq!(
            state_changed("buffering", "playing").severity(),
            EventSeverity::Info
        );

        let progress = CoreEvent::Playback(PlaybackEvent::Progressed {
            item_id: "track-1".to_string(),
            position_ms: 5000,
            duration_ms: None,
        });
        assert_eq!(progress.severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Cache(CacheEvent::CachingSkipped {
            item_id: None,
            reason: "missing item id".to_string(),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("CachingSkipped"));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
