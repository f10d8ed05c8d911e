//! # Event Bus System
//!
//! Provides an event-driven architecture for the player core using `tokio::sync::broadcast`.
//! The playback engine is the only publisher; presenters (UI, notification,
//! lock screen) subscribe and render what they receive.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for playback and session
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//! - **Subscription Management**: Multiple subscribers can listen independently
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐  emit   ┌───────────┐  subscribe  ┌──────────────┐
//! │ Playback engine ├────────>│ EventBus  ├────────────>│ Notification │
//! └─────────────────┘         │ (broadcast│             └──────────────┘
//!                             │  channel) │  subscribe  ┌──────────────┐
//!                             │           ├────────────>│ UI           │
//!                             └───────────┘             └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Session(SessionEvent::RestoreSkipped {
//!         reason: "nothing saved".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Session(_)));
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Playback Events
//! - `StateChanged`: Full observable state after a transition
//! - `TrackChanged`: Cursor moved to another track
//! - `QueueLoaded`: Queue replaced
//! - `PositionChanged`: Clock tick while playing
//! - `Completed`: Track finished on its own
//! - `FocusDenied`: Play refused because focus was not granted
//! - `TrackUnplayable`: Preparation failed
//!
//! ### Session Events
//! - `Restored`: Persisted session applied at startup
//! - `RestoreSkipped`: Nothing usable was persisted
//! - `SaveFailed`: Session snapshot could not be written
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events. Position
//!   ticks are the bulk of the traffic, so a lagging presenter can simply
//!   carry on; the next `StateChanged` brings it back in sync.
//! - **`RecvError::Closed`**: the engine has shut down.

use bridge_traits::playback::{PlaybackStatus, RepeatMode};
use core_library::models::{Track, TrackId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Five position ticks per second leave room for about twenty seconds of
/// backlog before a stalled subscriber starts lagging.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Engine state transitions and clock ticks
    Playback(PlaybackEvent),
    /// Session persistence outcomes
    Session(SessionEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Session(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Session(SessionEvent::SaveFailed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::TrackUnplayable { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::FocusDenied { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::PositionChanged { .. }) => EventSeverity::Debug,
            CoreEvent::Session(SessionEvent::RestoreSkipped { .. }) => EventSeverity::Debug,
            _ => EventSeverity::Info,
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
// Player State
// ============================================================================

/// Observable state of the playback engine.
///
/// Returned by state queries and carried by every
/// [`PlaybackEvent::StateChanged`], so a presenter never has to stitch state
/// together from individual events.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerState {
    pub status: PlaybackStatus,
    pub current_track: Option<Track>,
    /// Last known position (milliseconds).
    pub position_ms: u64,
    /// Track duration once prepared (milliseconds).
    pub duration_ms: Option<u64>,
    pub shuffle: bool,
    pub repeat_mode: RepeatMode,
    /// Index into the active order; `None` while the queue is empty.
    pub cursor: Option<usize>,
    pub queue_len: usize,
    /// The current track failed to prepare.
    pub unplayable: bool,
}

impl PlayerState {
    pub fn position(&self) -> Duration {
        Duration::from_millis(self.position_ms)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }

    pub fn is_playing(&self) -> bool {
        self.status.is_playing()
    }

    pub fn current_track_id(&self) -> Option<TrackId> {
        self.current_track.as_ref().map(|track| track.id)
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to audio playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Engine state after a transition.
    StateChanged { state: PlayerState },
    /// Cursor moved onto another track.
    TrackChanged {
        track: Track,
        /// Index into the active order.
        cursor: usize,
        queue_len: usize,
    },
    /// Queue contents were replaced.
    QueueLoaded { queue_len: usize, start_index: usize },
    /// Clock tick while playing.
    PositionChanged {
        track_id: TrackId,
        /// Current position (milliseconds).
        position_ms: u64,
        /// Track duration (milliseconds).
        duration_ms: u64,
    },
    /// Track finished playing naturally.
    Completed { track_id: TrackId },
    /// Play was refused because audio focus was denied.
    FocusDenied { track_id: Option<TrackId> },
    /// The track could not be prepared.
    TrackUnplayable {
        track_id: TrackId,
        /// Human-readable error message.
        message: String,
        /// Whether the engine moved on to the next track.
        skipped: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::TrackChanged { .. } => "Current track changed",
            PlaybackEvent::QueueLoaded { .. } => "Queue loaded",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::FocusDenied { .. } => "Audio focus denied",
            PlaybackEvent::TrackUnplayable { .. } => "Track unplayable",
        }
    }
}

// ============================================================================
// Session Events
// ============================================================================

/// Events related to saving and restoring the listening session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// Persisted session was applied to the engine.
    Restored {
        track_id: TrackId,
        queue_len: usize,
        /// Persisted ids the catalog no longer resolves.
        dropped: usize,
    },
    /// Restore ran but found nothing usable.
    RestoreSkipped { reason: String },
    /// Writing a snapshot failed; the previous one stays on disk.
    SaveFailed { message: String },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::Restored { .. } => "Session restored",
            SessionEvent::RestoreSkipped { .. } => "Session restore skipped",
            SessionEvent::SaveFailed { .. } => "Session save failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally: clones of the bus share one
/// channel, each `subscribe()` creates an independent receiver, and slow
/// subscribers get `RecvError::Lagged` instead of blocking the publisher.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Subscribes and wraps the receiver in an [`EventStream`].
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
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
/// use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
///
/// let event_bus = EventBus::new(100);
/// let ticks = event_bus.stream().filter(|event| {
///     matches!(event, CoreEvent::Playback(PlaybackEvent::PositionChanged { .. }))
/// });
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

    /// Only events matching `predicate` are returned by `recv()`.
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
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching event is currently available.
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
