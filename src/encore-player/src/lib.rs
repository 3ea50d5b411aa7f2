mod library;
mod persistence;
mod playback;
mod poller;
mod queue;
mod state;

pub use library::TrackLibrary;
pub use persistence::{
    DurableState, PersistenceError, PersistenceResult, StatePersistence, UiState,
};
pub use playback::PlaybackController;
pub use poller::{Poller, PollerState};
pub use queue::{QueueId, QueueItem, QueueManager, QueueStatistics};
pub use state::{
    AppState, ObserverId, PlayRecord, StateError, StateField, StatePatch, StateResult,
    StateStore, DEFAULT_VIEW, MAX_PLAY_HISTORY,
};
