//! Application-wide event bus.
//!
//! Producers call [`EventBus::emit`], which records the event in a bounded
//! history and queues it without waiting on any handler. A single dispatch
//! loop ([`EventBus::process`]) drains the queue in FIFO order and runs the
//! handlers subscribed to each event's kind one after another, in
//! subscription order. Every handler invocation runs as its own task, so an
//! error or a panic is logged and the remaining handlers still run.

use std::collections::{HashMap, VecDeque};
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::{PlaybackStatus, TrackInfo};

/// Number of events kept in the history buffer unless configured otherwise.
pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// Closed set of event kinds; handlers subscribe per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TrackChanged,
    PlaybackStarted,
    PlaybackPaused,
    PlaybackStopped,
    VolumeChanged,
    QueueUpdated,
    QueueCleared,
    LibraryScanned,
    TrackAdded,
    TrackRemoved,
    ViewChanged,
    SearchPerformed,
    SelectionChanged,
    CommandExecuted,
    KeybindTriggered,
}

impl EventKind {
    pub const ALL: [EventKind; 15] = [
        EventKind::TrackChanged,
        EventKind::PlaybackStarted,
        EventKind::PlaybackPaused,
        EventKind::PlaybackStopped,
        EventKind::VolumeChanged,
        EventKind::QueueUpdated,
        EventKind::QueueCleared,
        EventKind::LibraryScanned,
        EventKind::TrackAdded,
        EventKind::TrackRemoved,
        EventKind::ViewChanged,
        EventKind::SearchPerformed,
        EventKind::SelectionChanged,
        EventKind::CommandExecuted,
        EventKind::KeybindTriggered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TrackChanged => "track_changed",
            EventKind::PlaybackStarted => "playback_started",
            EventKind::PlaybackPaused => "playback_paused",
            EventKind::PlaybackStopped => "playback_stopped",
            EventKind::VolumeChanged => "volume_changed",
            EventKind::QueueUpdated => "queue_updated",
            EventKind::QueueCleared => "queue_cleared",
            EventKind::LibraryScanned => "library_scanned",
            EventKind::TrackAdded => "track_added",
            EventKind::TrackRemoved => "track_removed",
            EventKind::ViewChanged => "view_changed",
            EventKind::SearchPerformed => "search_performed",
            EventKind::SelectionChanged => "selection_changed",
            EventKind::CommandExecuted => "command_executed",
            EventKind::KeybindTriggered => "keybind_triggered",
        }
    }
}

/// Payload carried by an event; one fixed shape per kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    TrackChanged {
        previous: Option<TrackInfo>,
        current: Option<TrackInfo>,
    },
    PlaybackStarted {
        track: Option<TrackInfo>,
    },
    PlaybackPaused {
        track: Option<TrackInfo>,
    },
    PlaybackStopped {
        previous: PlaybackStatus,
    },
    VolumeChanged {
        previous: u8,
        current: u8,
    },
    QueueUpdated {
        length: usize,
    },
    QueueCleared,
    LibraryScanned {
        tracks: usize,
    },
    TrackAdded {
        track: TrackInfo,
    },
    TrackRemoved {
        file: String,
    },
    ViewChanged {
        previous: String,
        current: String,
    },
    SearchPerformed {
        query: String,
    },
    SelectionChanged {
        selected: Vec<String>,
    },
    CommandExecuted {
        command: String,
        success: bool,
    },
    KeybindTriggered {
        key: String,
        action: String,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::TrackChanged { .. } => EventKind::TrackChanged,
            EventPayload::PlaybackStarted { .. } => EventKind::PlaybackStarted,
            EventPayload::PlaybackPaused { .. } => EventKind::PlaybackPaused,
            EventPayload::PlaybackStopped { .. } => EventKind::PlaybackStopped,
            EventPayload::VolumeChanged { .. } => EventKind::VolumeChanged,
            EventPayload::QueueUpdated { .. } => EventKind::QueueUpdated,
            EventPayload::QueueCleared => EventKind::QueueCleared,
            EventPayload::LibraryScanned { .. } => EventKind::LibraryScanned,
            EventPayload::TrackAdded { .. } => EventKind::TrackAdded,
            EventPayload::TrackRemoved { .. } => EventKind::TrackRemoved,
            EventPayload::ViewChanged { .. } => EventKind::ViewChanged,
            EventPayload::SearchPerformed { .. } => EventKind::SearchPerformed,
            EventPayload::SelectionChanged { .. } => EventKind::SelectionChanged,
            EventPayload::CommandExecuted { .. } => EventKind::CommandExecuted,
            EventPayload::KeybindTriggered { .. } => EventKind::KeybindTriggered,
        }
    }
}

/// An immutable, timestamped event.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    payload: EventPayload,
    timestamp: SystemTime,
    source: Option<String>,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            payload,
            timestamp: SystemTime::now(),
            source: None,
        }
    }

    /// Tags the event with the component that produced it.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

impl From<EventPayload> for Event {
    fn from(payload: EventPayload) -> Self {
        Event::new(payload)
    }
}

/// Error a handler may return; it is logged and never stops dispatch.
pub type HandlerError = Box<dyn Error + Send + Sync>;
pub type HandlerResult = Result<(), HandlerError>;

/// A subscriber callback.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> HandlerResult;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) -> HandlerResult + Send + Sync,
{
    async fn handle(&self, event: &Event) -> HandlerResult {
        (self.0)(event)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("event dispatch loop is already running")]
    AlreadyProcessing,
}

struct Subscription {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
}

struct Inner {
    handlers: Mutex<HashMap<EventKind, Vec<Subscription>>>,
    history: Mutex<VecDeque<Event>>,
    history_size: usize,
    queue_tx: mpsc::UnboundedSender<Event>,
    queue_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Event>>,
    stop: Mutex<CancellationToken>,
    next_id: AtomicU64,
}

/// Cheaply cloneable handle to a shared bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("history_size", &self.inner.history_size)
            .field("history_len", &self.inner.history.lock().len())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history_size(DEFAULT_HISTORY_SIZE)
    }

    /// Bus that keeps the last `history_size` events for [`recent`](Self::recent).
    pub fn with_history_size(history_size: usize) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                handlers: Mutex::new(HashMap::new()),
                history: Mutex::new(VecDeque::with_capacity(history_size)),
                history_size,
                queue_tx,
                queue_rx: tokio::sync::Mutex::new(queue_rx),
                stop: Mutex::new(CancellationToken::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers `handler` for every event of `kind`.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .handlers
            .lock()
            .entry(kind)
            .or_default()
            .push(Subscription { id, handler });
        id
    }

    /// Registers a synchronous closure as a handler.
    pub fn subscribe_fn<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe(kind, Arc::new(FnHandler(handler)))
    }

    /// Removes a handler. Returns false when it was not registered for `kind`.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut handlers = self.inner.handlers.lock();
        let Some(subscriptions) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.id != id);
        let removed = subscriptions.len() != before;
        if subscriptions.is_empty() {
            handlers.remove(&kind);
        }
        removed
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.inner
            .handlers
            .lock()
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Records the event and queues it for dispatch. Never waits on handlers.
    pub fn emit(&self, event: impl Into<Event>) {
        let event = event.into();
        {
            let mut history = self.inner.history.lock();
            history.push_back(event.clone());
            while history.len() > self.inner.history_size {
                history.pop_front();
            }
        }
        tracing::trace!(kind = event.kind().as_str(), "event emitted");
        // The receiver lives as long as the bus, so this only fails during teardown.
        let _ = self.inner.queue_tx.send(event);
    }

    /// Oldest-first copy of the recent event history.
    pub fn history(&self) -> Vec<Event> {
        self.inner.history.lock().iter().cloned().collect()
    }

    /// Most recent events of one kind, oldest first.
    pub fn recent(&self, kind: EventKind, limit: usize) -> Vec<Event> {
        let history = self.inner.history.lock();
        let mut matching: Vec<Event> = history
            .iter()
            .rev()
            .filter(|event| event.kind() == kind)
            .take(limit)
            .cloned()
            .collect();
        matching.reverse();
        matching
    }

    /// Runs the dispatch loop until [`EventBus::stop`] is called.
    ///
    /// After a stop request the loop dispatches every event that was already
    /// queued and then returns; events emitted afterwards wait for the next
    /// call to `process`.
    pub async fn process(&self) -> Result<(), EventBusError> {
        let mut queue = self
            .inner
            .queue_rx
            .try_lock()
            .map_err(|_| EventBusError::AlreadyProcessing)?;
        let stop = self.inner.stop.lock().clone();
        tracing::debug!("event dispatch loop started");

        loop {
            tokio::select! {
                biased;
                next = queue.recv() => match next {
                    Some(event) => self.dispatch(event).await,
                    None => break,
                },
                _ = stop.cancelled() => {
                    let mut drained = 0usize;
                    while let Ok(event) = queue.try_recv() {
                        self.dispatch(event).await;
                        drained += 1;
                    }
                    tracing::debug!(drained, "event dispatch loop stopping");
                    break;
                }
            }
        }

        *self.inner.stop.lock() = CancellationToken::new();
        Ok(())
    }

    /// Asks the dispatch loop to drain the queue and exit.
    pub fn stop(&self) {
        self.inner.stop.lock().cancel();
    }

    async fn dispatch(&self, event: Event) {
        let kind = event.kind();
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .inner
            .handlers
            .lock()
            .get(&kind)
            .map(|subscriptions| {
                subscriptions
                    .iter()
                    .map(|subscription| subscription.handler.clone())
                    .collect()
            })
            .unwrap_or_default();

        for handler in handlers {
            let task_event = event.clone();
            let outcome =
                tokio::spawn(async move { handler.handle(&task_event).await }).await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(kind = kind.as_str(), error = %e, "event handler failed");
                }
                Err(e) => {
                    tracing::error!(kind = kind.as_str(), error = %e, "event handler panicked");
                }
            }
        }
    }
}
