//! # Event Bus System
//!
//! Provides the cross-cutting notification channel of the playback core using
//! `tokio::sync::broadcast`. Observers that are not the direct owner of a
//! player (progress UI, "don't interrupt this seek" locks, loggers) subscribe
//! here instead of to a particular player's property stream.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for seek, queue, item and playback
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   emit    ┌───────────┐
//! │ Seek Coordinator ├──────────>│           │
//! └──────────────────┘           │           │    subscribe    ┌────────────┐
//!                                │ EventBus  ├────────────────>│ Progress UI│
//! ┌──────────────────┐   emit    │ (broadcast│                 └────────────┘
//! │ Player Facade    ├──────────>│  channel) │    subscribe    ┌────────────┐
//! └──────────────────┘           │           ├────────────────>│ Host logger│
//!                                └───────────┘                 └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SeekEvent};
//! use bridge_traits::MediaTime;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Seek(SeekEvent::Started {
//!         target: MediaTime::from_seconds(42.0),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Seek(SeekEvent::Started { .. })));
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Seek Events
//! - `Started`: A logical (possibly coalesced) seek began, with its target
//! - `Ended`: All pending seeks were resolved
//!
//! ### Queue Events
//! - `ItemsChanged`: The caller-facing item list changed
//! - `CurrentItemChanged`: A different item became current
//! - `Stopped`: Playback stopped at an item with nothing left to advance to
//!
//! ### Item Events
//! - `Ready`, `Ended`, `Failed`, `ResolutionFailed`
//!
//! ### Playback Events
//! - `StateChanged`, `BufferingChanged`, `StreamTypeChanged`
//!
//! ## Delivery
//!
//! A subscriber more than the bus capacity behind gets `RecvError::Lagged`
//! once and then resumes with the oldest retained event. `RecvError::Closed`
//! means the player that owned the bus is gone. Publishing with nobody
//! listening is not an error for the player; it ignores the result.

use bridge_traits::MediaTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError, TryRecvError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Seek(SeekEvent),
    Queue(QueueEvent),
    Item(ItemEvent),
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Caller-facing id of the item the event is about, if it names one.
    pub fn item_id(&self) -> Option<&str> {
        match self {
            CoreEvent::Queue(QueueEvent::CurrentItemChanged { current, .. }) => current.as_deref(),
            CoreEvent::Queue(QueueEvent::Stopped { item_id })
            | CoreEvent::Item(ItemEvent::Ready { item_id })
            | CoreEvent::Item(ItemEvent::Ended { item_id })
            | CoreEvent::Item(ItemEvent::Failed { item_id, .. })
            | CoreEvent::Item(ItemEvent::ResolutionFailed { item_id, .. }) => Some(item_id.as_str()),
            CoreEvent::Playback(PlaybackEvent::StateChanged { item_id, .. })
            | CoreEvent::Playback(PlaybackEvent::StreamTypeChanged { item_id, .. }) => {
                item_id.as_deref()
            }
            _ => None,
        }
    }

    /// Short human-readable label.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Seek(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Item(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Item(ItemEvent::Failed { .. })
            | CoreEvent::Item(ItemEvent::ResolutionFailed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::StateChanged { state, .. })
                if state == "failed" =>
            {
                EventSeverity::Warning
            }
            CoreEvent::Queue(QueueEvent::CurrentItemChanged { .. })
            | CoreEvent::Queue(QueueEvent::Stopped { .. }) => EventSeverity::Info,
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
// Seek Events
// ============================================================================

/// Seek notifications. One `Started`/`Ended` pair is published per logical
/// seek, however many requests were coalesced into it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum SeekEvent {
    Started { target: MediaTime },
    Ended,
}

impl SeekEvent {
    fn description(&self) -> &str {
        match self {
            SeekEvent::Started { .. } => "Seek started",
            SeekEvent::Ended => "Seek ended",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// The caller-facing list was replaced or mutated.
    ItemsChanged {
        item_ids: Vec<String>,
    },
    CurrentItemChanged {
        previous: Option<String>,
        current: Option<String>,
        index: Option<usize>,
    },
    /// The last item finished and there was nothing to advance to.
    Stopped {
        item_id: String,
    },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::ItemsChanged { .. } => "Queue items changed",
            QueueEvent::CurrentItemChanged { .. } => "Current item changed",
            QueueEvent::Stopped { .. } => "Queue stopped",
        }
    }
}

// ============================================================================
// Item Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum ItemEvent {
    Ready {
        item_id: String,
    },
    Ended {
        item_id: String,
    },
    /// The native player failed to play the item.
    Failed {
        item_id: String,
        domain: String,
        code: i64,
        message: String,
    },
    /// The item's resource could not be resolved; it never reached the native player.
    ResolutionFailed {
        item_id: String,
        message: String,
    },
}

impl ItemEvent {
    fn description(&self) -> &str {
        match self {
            ItemEvent::Ready { .. } => "Item ready to play",
            ItemEvent::Ended { .. } => "Item played to end",
            ItemEvent::Failed { .. } => "Item failed",
            ItemEvent::ResolutionFailed { .. } => "Item resolution failed",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    StateChanged {
        item_id: Option<String>,
        /// `idle`, `playing`, `paused`, `ended` or `failed`.
        state: String,
    },
    BufferingChanged {
        is_buffering: bool,
    },
    StreamTypeChanged {
        item_id: Option<String>,
        /// `unknown`, `on_demand`, `live` or `dvr`.
        stream_type: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::BufferingChanged { .. } => "Buffering changed",
            PlaybackEvent::StreamTypeChanged { .. } => "Stream type changed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel shared by a player and everything observing it.
///
/// Cloning yields another publisher on the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` is how many events a subscriber may fall behind before it
    /// starts losing them.
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
        }
    }

    /// Publishes to every current subscriber and returns how many there were.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// New receiver. It only sees events published after this call.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

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
        write!(f, "EventBus({} subscribers)", self.subscriber_count())
    }
}

// ============================================================================
// Filtered subscription
// ============================================================================

type Predicate = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A subscription that skips events its predicates reject.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::default();
/// let seeks_of_a = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Seek(_)))
///     .for_item("a");
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    predicates: Vec<Predicate>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            predicates: Vec::new(),
        }
    }

    /// Keeps only events matching `predicate`. Filters accumulate.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Keeps events about `item_id` plus events that name no item at all
    /// (seeks, buffering).
    pub fn for_item(self, item_id: impl Into<String>) -> Self {
        let item_id = item_id.into();
        self.filter(move |event| event.item_id().map_or(true, |id| id == item_id))
    }

    fn wants(&self, event: &CoreEvent) -> bool {
        self.predicates.iter().all(|predicate| predicate(event))
    }

    /// Waits for the next accepted event.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged` when events were lost, `RecvError::Closed` once
    /// the bus is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.wants(&event) {
                return Ok(event);
            }
        }
    }

    /// Next accepted event that is already buffered, if any.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(missed)) => return Some(Err(RecvError::Lagged(missed))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if self.wants(&event) {
                return Some(Ok(event));
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("predicates", &self.predicates.len())
            .finish()
    }
}
