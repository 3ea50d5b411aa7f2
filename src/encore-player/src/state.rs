//! Canonical application state.
//!
//! [`StateStore`] is the only writer of the player snapshot and queue. Updates
//! are applied atomically under one lock. Transition events are queued on the
//! bus before that lock is released, so their order matches the order of the
//! writes. Observers run after the lock is released and may call back into
//! the store.

use crate::persistence::{DurableState, PersistenceError, StatePersistence, UiState};
use encore_core::{Event, EventBus, EventPayload, PlaybackStatus, PlayerStatus, TrackInfo};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const DEFAULT_VIEW: &str = "dashboard";

/// Play history entries kept in memory and on disk.
pub const MAX_PLAY_HISTORY: usize = 1000;

const TRACKS_PLAYED: &str = "tracks_played";
const EVENT_SOURCE: &str = "state";

/// Rejected patches and persistence failures.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("unknown state field `{0}`")]
    UnknownField(String),
    #[error("invalid value for `{field}`: {source}")]
    InvalidValue {
        field: StateField,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type StateResult<T> = Result<T, StateError>;

/// One entry of the play history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRecord {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Unix timestamp in seconds.
    pub played_at: u64,
}

impl PlayRecord {
    fn from_track(track: &TrackInfo) -> Self {
        let played_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        Self {
            file: track.file.clone(),
            artist: track.artist.clone(),
            title: track.title.clone(),
            played_at,
        }
    }
}

/// Full application state. Only the store writes it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub player_status: Option<PlayerStatus>,
    /// Insertion order is playback order.
    pub queue: Vec<TrackInfo>,
    pub active_view: String,
    pub selected_items: Vec<String>,
    pub search_query: String,
    pub playlists: BTreeMap<String, Vec<String>>,
    pub play_history: Vec<PlayRecord>,
    pub statistics: BTreeMap<String, serde_json::Value>,
    /// Rebuilt lazily; never persisted.
    pub library_cache: HashMap<String, TrackInfo>,
    /// Rebuilt lazily; never persisted.
    pub album_art_cache: HashMap<String, String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            player_status: None,
            queue: Vec::new(),
            active_view: DEFAULT_VIEW.into(),
            selected_items: Vec::new(),
            search_query: String::new(),
            playlists: BTreeMap::new(),
            play_history: Vec::new(),
            statistics: BTreeMap::new(),
            library_cache: HashMap::new(),
            album_art_cache: HashMap::new(),
        }
    }
}

impl AppState {
    fn durable(&self) -> DurableState {
        DurableState {
            playlists: self.playlists.clone(),
            play_history: self.play_history.clone(),
            statistics: self.statistics.clone(),
            ui_state: UiState {
                active_view: self.active_view.clone(),
                search_query: self.search_query.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateField {
    PlayerStatus,
    Queue,
    ActiveView,
    SelectedItems,
    SearchQuery,
    Playlists,
    PlayHistory,
    Statistics,
    LibraryCache,
    AlbumArtCache,
}

impl StateField {
    pub const ALL: [StateField; 10] = [
        StateField::PlayerStatus,
        StateField::Queue,
        StateField::ActiveView,
        StateField::SelectedItems,
        StateField::SearchQuery,
        StateField::Playlists,
        StateField::PlayHistory,
        StateField::Statistics,
        StateField::LibraryCache,
        StateField::AlbumArtCache,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateField::PlayerStatus => "player_status",
            StateField::Queue => "queue",
            StateField::ActiveView => "active_view",
            StateField::SelectedItems => "selected_items",
            StateField::SearchQuery => "search_query",
            StateField::Playlists => "playlists",
            StateField::PlayHistory => "play_history",
            StateField::Statistics => "statistics",
            StateField::LibraryCache => "library_cache",
            StateField::AlbumArtCache => "album_art_cache",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A partial update: only the fields that are set are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub player_status: Option<PlayerStatus>,
    pub queue: Option<Vec<TrackInfo>>,
    pub active_view: Option<String>,
    pub selected_items: Option<Vec<String>>,
    pub search_query: Option<String>,
    pub playlists: Option<BTreeMap<String, Vec<String>>>,
    pub play_history: Option<Vec<PlayRecord>>,
    pub statistics: Option<BTreeMap<String, serde_json::Value>>,
    pub library_cache: Option<HashMap<String, TrackInfo>>,
    pub album_art_cache: Option<HashMap<String, String>>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player_status(mut self, status: PlayerStatus) -> Self {
        self.player_status = Some(status);
        self
    }

    pub fn queue(mut self, queue: Vec<TrackInfo>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn active_view(mut self, view: impl Into<String>) -> Self {
        self.active_view = Some(view.into());
        self
    }

    pub fn selected_items(mut self, items: Vec<String>) -> Self {
        self.selected_items = Some(items);
        self
    }

    pub fn search_query(mut self, query: impl Into<String>) -> Self {
        self.search_query = Some(query.into());
        self
    }

    pub fn playlists(mut self, playlists: BTreeMap<String, Vec<String>>) -> Self {
        self.playlists = Some(playlists);
        self
    }

    pub fn statistics(mut self, statistics: BTreeMap<String, serde_json::Value>) -> Self {
        self.statistics = Some(statistics);
        self
    }

    /// Builds a patch from dynamically named fields.
    ///
    /// Any name that is not a [`StateField`] fails the whole patch.
    pub fn from_pairs<I, K>(pairs: I) -> StateResult<Self>
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: AsRef<str>,
    {
        let mut patch = Self::new();
        for (name, value) in pairs {
            let name = name.as_ref();
            let field =
                StateField::from_name(name).ok_or_else(|| StateError::UnknownField(name.into()))?;
            match field {
                StateField::PlayerStatus => patch.player_status = Some(decode(field, value)?),
                StateField::Queue => patch.queue = Some(decode(field, value)?),
                StateField::ActiveView => patch.active_view = Some(decode(field, value)?),
                StateField::SelectedItems => patch.selected_items = Some(decode(field, value)?),
                StateField::SearchQuery => patch.search_query = Some(decode(field, value)?),
                StateField::Playlists => patch.playlists = Some(decode(field, value)?),
                StateField::PlayHistory => patch.play_history = Some(decode(field, value)?),
                StateField::Statistics => patch.statistics = Some(decode(field, value)?),
                StateField::LibraryCache => patch.library_cache = Some(decode(field, value)?),
                StateField::AlbumArtCache => patch.album_art_cache = Some(decode(field, value)?),
            }
        }
        Ok(patch)
    }

    pub fn fields(&self) -> Vec<StateField> {
        let present = [
            self.player_status.is_some(),
            self.queue.is_some(),
            self.active_view.is_some(),
            self.selected_items.is_some(),
            self.search_query.is_some(),
            self.playlists.is_some(),
            self.play_history.is_some(),
            self.statistics.is_some(),
            self.library_cache.is_some(),
            self.album_art_cache.is_some(),
        ];
        StateField::ALL
            .into_iter()
            .zip(present)
            .filter_map(|(field, set)| set.then_some(field))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

fn decode<T: DeserializeOwned>(field: StateField, value: serde_json::Value) -> StateResult<T> {
    serde_json::from_value(value).map_err(|source| StateError::InvalidValue { field, source })
}

/// Handle returned by [`StateStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = dyn Fn(&StateStore, &[StateField]) + Send + Sync;

/// Single writer for [`AppState`] with field observers and bus events.
pub struct StateStore {
    state: Mutex<AppState>,
    observers: Mutex<Vec<(ObserverId, Arc<Observer>)>>,
    next_observer: AtomicU64,
    bus: Option<EventBus>,
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("observers", &self.observers.lock().len())
            .field("bus", &self.bus.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AppState::default()),
            observers: Mutex::new(Vec::new()),
            next_observer: AtomicU64::new(1),
            bus: None,
        }
    }

    /// Store that publishes state transitions on `bus`.
    pub fn with_bus(bus: EventBus) -> Self {
        Self {
            bus: Some(bus),
            ..Self::new()
        }
    }

    /// Applies `patch` atomically and returns the fields that were written.
    ///
    /// A new current track also appends to the play history and bumps the
    /// `tracks_played` statistic; those fields are reported as written too.
    pub fn update(&self, patch: StatePatch) -> Vec<StateField> {
        if patch.is_empty() {
            return Vec::new();
        }
        let fields = {
            let mut state = self.state.lock();
            let (fields, events) = apply(&mut state, patch);
            // `emit` only enqueues, so it is safe under the lock.
            if let Some(bus) = &self.bus {
                for payload in events {
                    bus.emit(Event::new(payload).with_source(EVENT_SOURCE));
                }
            }
            fields
        };
        self.notify(&fields);
        fields
    }

    /// Adds or replaces one playlist.
    pub fn save_playlist(&self, name: impl Into<String>, files: Vec<String>) {
        self.state.lock().playlists.insert(name.into(), files);
        self.notify(&[StateField::Playlists]);
    }

    /// Registers an observer called with the fields each update changed.
    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&StateStore, &[StateField]) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().push((id, Arc::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Runs `f` against a consistent view of the state.
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.state.lock())
    }

    /// Clone of the whole state.
    pub fn snapshot(&self) -> AppState {
        self.read(AppState::clone)
    }

    pub fn player_status(&self) -> Option<PlayerStatus> {
        self.read(|state| state.player_status.clone())
    }

    pub fn queue(&self) -> Vec<TrackInfo> {
        self.read(|state| state.queue.clone())
    }

    /// Writes the durable subset to `path`.
    pub fn save(&self, path: &Path) -> StateResult<()> {
        let durable = self.read(AppState::durable);
        StatePersistence::new(path).save(&durable)?;
        Ok(())
    }

    /// Restores the durable subset from `path`; a missing file leaves defaults.
    pub fn load(&self, path: &Path) -> StateResult<()> {
        let durable = StatePersistence::new(path).load()?;
        let mut state = self.state.lock();
        state.playlists = durable.playlists;
        state.play_history = durable.play_history;
        state.statistics = durable.statistics;
        state.active_view = durable.ui_state.active_view;
        state.search_query = durable.ui_state.search_query;
        Ok(())
    }

    fn notify(&self, fields: &[StateField]) {
        let observers: Vec<_> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(self, fields);
        }
    }
}

fn apply(state: &mut AppState, patch: StatePatch) -> (Vec<StateField>, Vec<EventPayload>) {
    let mut fields = patch.fields();
    let mut events = Vec::new();

    if let Some(status) = patch.player_status {
        let previous = state.player_status.take();
        if let Some(track) = status_transitions(previous.as_ref(), &status, &mut events) {
            record_play(state, &track);
            fields.extend([StateField::PlayHistory, StateField::Statistics]);
        }
        state.player_status = Some(status);
    }
    if let Some(queue) = patch.queue {
        if queue != state.queue {
            events.push(if queue.is_empty() {
                EventPayload::QueueCleared
            } else {
                EventPayload::QueueUpdated {
                    length: queue.len(),
                }
            });
        }
        state.queue = queue;
    }
    if let Some(view) = patch.active_view {
        if view != state.active_view {
            events.push(EventPayload::ViewChanged {
                previous: std::mem::replace(&mut state.active_view, view.clone()),
                current: view,
            });
        }
    }
    if let Some(selected) = patch.selected_items {
        if selected != state.selected_items {
            events.push(EventPayload::SelectionChanged {
                selected: selected.clone(),
            });
        }
        state.selected_items = selected;
    }
    if let Some(query) = patch.search_query {
        if query != state.search_query {
            events.push(EventPayload::SearchPerformed {
                query: query.clone(),
            });
        }
        state.search_query = query;
    }
    if let Some(playlists) = patch.playlists {
        state.playlists = playlists;
    }
    if let Some(history) = patch.play_history {
        state.play_history = history;
        trim_history(&mut state.play_history);
    }
    if let Some(statistics) = patch.statistics {
        state.statistics = statistics;
    }
    if let Some(cache) = patch.library_cache {
        state.library_cache = cache;
    }
    if let Some(cache) = patch.album_art_cache {
        state.album_art_cache = cache;
    }

    fields.sort();
    fields.dedup();
    (fields, events)
}

/// Collects events for a status change and returns the newly started track.
fn status_transitions(
    previous: Option<&PlayerStatus>,
    current: &PlayerStatus,
    events: &mut Vec<EventPayload>,
) -> Option<TrackInfo> {
    let previous_track = previous.and_then(|status| status.track.as_ref());
    let changed_track = match (previous_track, current.track.as_ref()) {
        (Some(old), Some(new)) => !old.same_track(new),
        (None, None) => false,
        _ => true,
    };
    if changed_track {
        events.push(EventPayload::TrackChanged {
            previous: previous_track.cloned(),
            current: current.track.clone(),
        });
    }

    let previous_status = previous
        .map(|status| status.status)
        .unwrap_or(PlaybackStatus::Stopped);
    if previous_status != current.status {
        events.push(match current.status {
            PlaybackStatus::Playing => EventPayload::PlaybackStarted {
                track: current.track.clone(),
            },
            PlaybackStatus::Paused => EventPayload::PlaybackPaused {
                track: current.track.clone(),
            },
            PlaybackStatus::Stopped => EventPayload::PlaybackStopped {
                previous: previous_status,
            },
        });
    }

    if let Some(previous) = previous {
        if previous.volume != current.volume {
            events.push(EventPayload::VolumeChanged {
                previous: previous.volume,
                current: current.volume,
            });
        }
    }

    if changed_track {
        current.track.clone()
    } else {
        None
    }
}

fn record_play(state: &mut AppState, track: &TrackInfo) {
    state.play_history.push(PlayRecord::from_track(track));
    trim_history(&mut state.play_history);
    let played = state
        .statistics
        .get(TRACKS_PLAYED)
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);
    state
        .statistics
        .insert(TRACKS_PLAYED.into(), serde_json::Value::from(played + 1));
}

fn trim_history(history: &mut Vec<PlayRecord>) {
    if history.len() > MAX_PLAY_HISTORY {
        history.drain(..history.len() - MAX_PLAY_HISTORY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_core::EventKind;
    use serde_json::json;
    use tempfile::tempdir;

    fn playing(file: &str, volume: u8) -> PlayerStatus {
        PlayerStatus {
            status: PlaybackStatus::Playing,
            track: Some(TrackInfo::new(file)),
            volume,
            ..PlayerStatus::default()
        }
    }

    #[test]
    fn update_applies_only_present_fields() {
        let store = StateStore::new();
        store.update(StatePatch::new().search_query("abba"));
        let fields = store.update(StatePatch::new().active_view("library"));

        assert_eq!(fields, vec![StateField::ActiveView]);
        let state = store.snapshot();
        assert_eq!(state.active_view, "library");
        assert_eq!(state.search_query, "abba");
    }

    #[test]
    fn observers_see_committed_state_and_may_reenter() {
        let store = Arc::new(StateStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            store.subscribe(move |store, fields| {
                seen.lock().push(fields.to_vec());
                if fields.contains(&StateField::ActiveView) {
                    // Re-entrant update must not deadlock.
                    store.update(StatePatch::new().search_query("from observer"));
                }
            });
        }

        store.update(StatePatch::new().active_view("queue"));

        assert_eq!(store.read(|s| s.search_query.clone()), "from observer");
        assert_eq!(
            *seen.lock(),
            vec![vec![StateField::ActiveView], vec![StateField::SearchQuery]]
        );
    }

    #[test]
    fn unsubscribed_observer_is_not_called() {
        let store = StateStore::new();
        let calls = Arc::new(AtomicU64::new(0));
        let id = {
            let calls = Arc::clone(&calls);
            store.subscribe(move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        store.update(StatePatch::new().active_view("a"));
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.update(StatePatch::new().active_view("b"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn from_pairs_rejects_unknown_fields() {
        let err = StatePatch::from_pairs([
            ("active_view", json!("library")),
            ("volume_boost", json!(11)),
        ])
        .unwrap_err();
        assert!(matches!(err, StateError::UnknownField(name) if name == "volume_boost"));
    }

    #[test]
    fn from_pairs_decodes_typed_values() {
        let patch = StatePatch::from_pairs([
            ("search_query", json!("jazz")),
            ("queue", json!([{ "file": "/m/a.mp3", "title": "A" }])),
        ])
        .unwrap();
        assert_eq!(patch.search_query.as_deref(), Some("jazz"));
        assert_eq!(patch.queue.as_ref().map(Vec::len), Some(1));

        let err = StatePatch::from_pairs([("queue", json!("nope"))]).unwrap_err();
        assert!(matches!(
            err,
            StateError::InvalidValue {
                field: StateField::Queue,
                ..
            }
        ));
    }

    #[test]
    fn new_track_is_recorded_once() {
        let store = StateStore::new();
        let fields = store.update(StatePatch::new().player_status(playing("/m/a.mp3", 80)));
        assert!(fields.contains(&StateField::PlayHistory));

        // Same track at a later position is not a new play.
        let mut later = playing("/m/a.mp3", 80);
        if let Some(track) = later.track.as_mut() {
            track.position = Some(42);
        }
        let fields = store.update(StatePatch::new().player_status(later));
        assert_eq!(fields, vec![StateField::PlayerStatus]);

        store.update(StatePatch::new().player_status(playing("/m/b.mp3", 80)));

        let state = store.snapshot();
        let files: Vec<_> = state.play_history.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(files, ["/m/a.mp3", "/m/b.mp3"]);
        assert_eq!(state.statistics[TRACKS_PLAYED], json!(2));
    }

    #[tokio::test]
    async fn transitions_are_published_on_the_bus() {
        let bus = EventBus::new();
        let store = StateStore::with_bus(bus.clone());

        store.update(StatePatch::new().player_status(playing("/m/a.mp3", 80)));
        store.update(StatePatch::new().player_status(PlayerStatus {
            status: PlaybackStatus::Paused,
            ..playing("/m/a.mp3", 60)
        }));
        store.update(StatePatch::new().queue(vec![TrackInfo::new("/m/b.mp3")]));
        store.update(StatePatch::new().queue(Vec::new()));
        store.update(StatePatch::new().active_view("library"));

        let kinds: Vec<_> = bus.history().iter().map(Event::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::TrackChanged,
                EventKind::PlaybackStarted,
                EventKind::PlaybackPaused,
                EventKind::VolumeChanged,
                EventKind::QueueUpdated,
                EventKind::QueueCleared,
                EventKind::ViewChanged,
            ]
        );
        assert!(bus.history().iter().all(|e| e.source() == Some(EVENT_SOURCE)));
    }

    #[test]
    fn concurrent_volume_changes_are_published_in_write_order() {
        let bus = EventBus::with_history_size(10_000);
        let store = StateStore::with_bus(bus.clone());
        store.update(StatePatch::new().player_status(playing("/m/a.mp3", 0)));

        std::thread::scope(|scope| {
            for writer in 0..4u8 {
                let store = &store;
                scope.spawn(move || {
                    for step in 0..200u16 {
                        let volume = ((u16::from(writer) * 37 + step * 7) % 101) as u8;
                        store.update(StatePatch::new().player_status(playing("/m/a.mp3", volume)));
                    }
                });
            }
        });

        let changes: Vec<(u8, u8)> = bus
            .history()
            .iter()
            .filter_map(|event| match event.payload() {
                EventPayload::VolumeChanged { previous, current } => Some((*previous, *current)),
                _ => None,
            })
            .collect();
        assert!(!changes.is_empty());
        assert_eq!(changes[0].0, 0);
        for pair in changes.windows(2) {
            assert_eq!(pair[0].1, pair[1].0, "volume events out of order: {pair:?}");
        }
        let final_volume = store.player_status().map(|status| status.volume);
        assert_eq!(changes.last().map(|change| change.1), final_volume);
    }

    #[test]
    fn save_and_load_durable_subset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = StateStore::new();
        store.update(StatePatch::new().player_status(playing("/m/a.mp3", 50)));
        store.save_playlist("road trip", vec!["/m/a.mp3".into()]);
        store.update(
            StatePatch::new()
                .active_view("playlists")
                .search_query("road")
                .queue(vec![TrackInfo::new("/m/a.mp3")]),
        );
        store.save(&path).unwrap();

        let restored = StateStore::new();
        restored.load(&path).unwrap();
        let before = store.snapshot();
        let after = restored.snapshot();
        assert_eq!(after.playlists, before.playlists);
        assert_eq!(after.play_history, before.play_history);
        assert_eq!(after.statistics, before.statistics);
        assert_eq!(after.active_view, "playlists");
        assert_eq!(after.search_query, "road");
        // Runtime-only fields are not restored.
        assert!(after.queue.is_empty());
        assert!(after.player_status.is_none());
    }

    #[test]
    fn load_missing_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let store = StateStore::new();
        store.load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(store.snapshot(), AppState::default());
    }
}
