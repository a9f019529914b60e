//! # Player Event Bus
//!
//! Lifecycle notifications from the player to its host, delivered over
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **PlayerEvent**: closed set of notifications (`playing`, `pause`,
//!   `seeked`, `timeupdate`, `error`, ...)
//! - **EventBus**: broadcast sender owned by the player driver
//! - **EventStream**: receiver wrapper with an optional filter
//! - **once**: wait for the first matching event, then unsubscribe
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    emit     ┌───────────┐   subscribe   ┌────────────┐
//! │ Player driver├────────────>│ EventBus  ├──────────────>│ UI binding │
//! └──────────────┘             │ (broadcast│               └────────────┘
//!                              │  channel) │   once(..)    ┌────────────┐
//!                              │           ├──────────────>│ test/await │
//!                              └───────────┘               └────────────┘
//! ```
//!
//! Every subscriber owns an independent receiver. Subscribing or dropping a
//! subscription while another subscriber is handling an event never affects
//! delivery to anyone else, so a consumer may unsubscribe itself from inside
//! its own handling loop.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, PlayerEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut stream = bus.stream().filter(|e| matches!(e, PlayerEvent::TimeUpdate { .. }));
//!
//! bus.emit(PlayerEvent::Playing).ok();
//! bus.emit(PlayerEvent::TimeUpdate { current_time: 1.5 }).ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event, PlayerEvent::TimeUpdate { current_time: 1.5 });
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell `n` events behind. Non-fatal.
//! - **`RecvError::Closed`**: the player was dropped.
//!
//! `timeupdate` fires every poll interval, so slow subscribers should size
//! the bus accordingly or filter.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 128;

// ============================================================================
// Player Events
// ============================================================================

/// Notifications emitted by the player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum PlayerEvent {
    /// Playback session started or resumed and is rendering (or buffering
    /// towards rendering).
    Playing,
    /// Playback resumed after a pause.
    Play,
    /// Playback paused.
    Pause,
    /// Session stopped; the player is idle again.
    Ended,
    /// A seek was issued.
    Seeking { target_ms: u64 },
    /// A seek resolved (first frame presented, or the decoder rejected it).
    Seeked,
    /// Media duration became known.
    DurationChange { duration_ms: u64 },
    /// Periodic playback position, in seconds.
    TimeUpdate { current_time: f64 },
    /// The whole resource has been downloaded.
    CanPlayThrough,
    /// Loading indicator should be shown or hidden.
    Loading { visible: bool },
    /// A transport or decoder failure. State is left unchanged.
    Error {
        error_code: i32,
        status: i32,
        message: String,
    },
}

impl PlayerEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            PlayerEvent::Playing => "Playback running",
            PlayerEvent::Play => "Playback resumed",
            PlayerEvent::Pause => "Playback paused",
            PlayerEvent::Ended => "Playback ended",
            PlayerEvent::Seeking { .. } => "Seek in progress",
            PlayerEvent::Seeked => "Seek completed",
            PlayerEvent::DurationChange { .. } => "Duration changed",
            PlayerEvent::TimeUpdate { .. } => "Playback position updated",
            PlayerEvent::CanPlayThrough => "Download complete",
            PlayerEvent::Loading { visible: true } => "Loading",
            PlayerEvent::Loading { visible: false } => "Loaded",
            PlayerEvent::Error { .. } => "Playback error",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            PlayerEvent::Error { .. } => EventSeverity::Error,
            PlayerEvent::TimeUpdate { .. } | PlayerEvent::Loading { .. } => EventSeverity::Debug,
            _ => EventSeverity::Info,
        }
    }

    /// Short wire name, matching the serde tag.
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::Playing => "playing",
            PlayerEvent::Play => "play",
            PlayerEvent::Pause => "pause",
            PlayerEvent::Ended => "ended",
            PlayerEvent::Seeking { .. } => "seeking",
            PlayerEvent::Seeked => "seeked",
            PlayerEvent::DurationChange { .. } => "durationchange",
            PlayerEvent::TimeUpdate { .. } => "timeupdate",
            PlayerEvent::CanPlayThrough => "canplaythrough",
            PlayerEvent::Loading { .. } => "loading",
            PlayerEvent::Error { .. } => "error",
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
// Event Bus
// ============================================================================

/// Broadcast channel for [`PlayerEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event. Returns the number of subscribers reached, or an
    /// error when nobody is listening.
    pub fn emit(&self, event: PlayerEvent) -> Result<usize, SendError<PlayerEvent>> {
        self.sender.send(event)
    }

    /// Raw receiver for all future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.sender.subscribe()
    }

    /// Receiver wrapped in an [`EventStream`].
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    /// Waits for the first event matching `predicate`, then drops the
    /// subscription.
    ///
    /// The subscription is created when this is called, not when the future
    /// is first polled, so events emitted right after the call are seen.
    pub fn once<F>(
        &self,
        predicate: F,
    ) -> impl std::future::Future<Output = Result<PlayerEvent, RecvError>> + Send + 'static
    where
        F: Fn(&PlayerEvent) -> bool + Send + Sync + 'static,
    {
        let mut stream = self.stream().filter(predicate);
        async move { stream.recv().await }
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
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&PlayerEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with optional filtering.
pub struct EventStream {
    receiver: Receiver<PlayerEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<PlayerEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned from this stream.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PlayerEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &PlayerEvent) -> bool {
        self.filter.as_ref().map(|f| f(event)).unwrap_or(true)
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<PlayerEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. `None` when nothing matching is queued.
    pub fn try_recv(&mut self) -> Option<Result<PlayerEvent, RecvError>> {
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

    /// Drains every queued event that passes the filter.
    pub fn drain(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
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

    #[tokio::test]
    async fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(PlayerEvent::Playing).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(4);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.emit(PlayerEvent::Seeked).unwrap(), 2);
        assert_eq!(first.recv().await.unwrap(), PlayerEvent::Seeked);
        assert_eq!(second.recv().await.unwrap(), PlayerEvent::Seeked);
    }

    #[tokio::test]
    async fn test_stream_filter_skips_other_events() {
        let bus = EventBus::new(8);
        let mut errors = bus
            .stream()
            .filter(|e| e.severity() == EventSeverity::Error);

        bus.emit(PlayerEvent::Playing).ok();
        bus.emit(PlayerEvent::Error {
            error_code: -1,
            status: 404,
            message: "metadata request failed".into(),
        })
        .ok();

        match errors.recv().await.unwrap() {
            PlayerEvent::Error { status, .. } => assert_eq!(status, 404),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_once_unsubscribes_after_first_match() {
        let bus = EventBus::new(8);
        let waiter = bus.once(|e| matches!(e, PlayerEvent::Ended));
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(PlayerEvent::Pause).ok();
        bus.emit(PlayerEvent::Ended).ok();

        assert_eq!(waiter.await.unwrap(), PlayerEvent::Ended);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_while_handling_does_not_disturb_others() {
        let bus = EventBus::new(8);
        let mut keeper = bus.stream();
        let mut quitter = bus.stream();

        bus.emit(PlayerEvent::Play).ok();
        bus.emit(PlayerEvent::Pause).ok();

        assert_eq!(quitter.recv().await.unwrap(), PlayerEvent::Play);
        drop(quitter);

        assert_eq!(keeper.drain(), vec![PlayerEvent::Play, PlayerEvent::Pause]);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_recovers() {
        let bus = EventBus::new(2);
        let mut stream = bus.stream();

        for i in 0..5 {
            bus.emit(PlayerEvent::TimeUpdate {
                current_time: i as f64,
            })
            .ok();
        }

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(_)))));
        assert!(matches!(stream.try_recv(), Some(Ok(PlayerEvent::TimeUpdate { .. }))));
    }

    #[test]
    fn test_event_serialization_uses_wire_names() {
        let json = serde_json::to_value(PlayerEvent::DurationChange { duration_ms: 10_000 }).unwrap();
        assert_eq!(json["event"], "durationchange");
        assert_eq!(json["duration_ms"], 10_000);

        let seeking = serde_json::to_value(PlayerEvent::Seeking { target_ms: 5 }).unwrap();
        assert_eq!(seeking["event"], PlayerEvent::Seeking { target_ms: 5 }.name());
    }

    #[test]
    fn test_descriptions_and_severity() {
        assert_eq!(PlayerEvent::CanPlayThrough.description(), "Download complete");
        assert_eq!(
            PlayerEvent::Loading { visible: true }.severity(),
            EventSeverity::Debug
        );
        assert_eq!(PlayerEvent::Ended.severity(), EventSeverity::Info);
    }
}
