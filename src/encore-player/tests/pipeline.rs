use async_trait::async_trait;
use encore_core::{EventBus, EventKind, EventPayload, PlaybackStatus, PlayerStatus, PollSettings, TrackInfo};
use encore_player::{PlaybackController, Poller, QueueManager, StatePatch, StateStore};
use encore_remote::{PlayerControl, RemoteCommand, RemoteError, RemoteResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Plays back a fixed list of statuses; an exhausted script reports a dead player.
struct FakePlayer {
    statuses: Mutex<VecDeque<PlayerStatus>>,
    sent: Mutex<Vec<RemoteCommand>>,
}

impl FakePlayer {
    fn new(statuses: Vec<PlayerStatus>) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(statuses.into()),
            sent: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PlayerControl for FakePlayer {
    fn is_connected(&self) -> bool {
        true
    }

    async fn send(&self, command: RemoteCommand) -> RemoteResult<String> {
        self.sent.lock().push(command);
        Ok(String::new())
    }

    async fn status(&self) -> RemoteResult<PlayerStatus> {
        self.statuses
            .lock()
            .pop_front()
            .ok_or(RemoteError::NotConnected)
    }
}

fn playing(file: &str, position: u32) -> PlayerStatus {
    let mut track = TrackInfo::new(file);
    track.position = Some(position);
    PlayerStatus {
        status: PlaybackStatus::Playing,
        track: Some(track),
        volume: 70,
        ..PlayerStatus::default()
    }
}

fn fast_settings() -> watch::Receiver<PollSettings> {
    watch::channel(PollSettings {
        refresh_interval: Duration::from_millis(100),
        backoff_interval: Duration::from_millis(500),
    })
    .1
}

#[tokio::test(start_paused = true)]
async fn polled_track_changes_reach_subscribers() {
    let player = FakePlayer::new(vec![
        playing("/m/one.mp3", 0),
        playing("/m/one.mp3", 1),
        playing("/m/two.mp3", 0),
    ]);
    let bus = EventBus::new();
    let store = Arc::new(StateStore::with_bus(bus.clone()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    bus.subscribe_fn(EventKind::TrackChanged, |_| Err("subscriber crashed".into()));
    {
        let seen = Arc::clone(&seen);
        bus.subscribe_fn(EventKind::TrackChanged, move |event| {
            if let EventPayload::TrackChanged {
                current: Some(track),
                ..
            } = event.payload()
            {
                seen.lock().push(track.file.clone());
            }
            Ok(())
        });
    }

    let dispatch = {
        let bus = bus.clone();
        tokio::spawn(async move { bus.process().await })
    };
    let shutdown = CancellationToken::new();
    let poller = Poller::new(player.clone(), store.clone(), fast_settings());
    let polling = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { poller.run(shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(250)).await;
    shutdown.cancel();
    polling.await.unwrap();
    bus.stop();
    dispatch.await.unwrap().unwrap();

    assert_eq!(*seen.lock(), ["/m/one.mp3", "/m/two.mp3"]);
    let history = store.read(|state| state.play_history.clone());
    assert_eq!(history.len(), 2);
    assert_eq!(
        store.player_status().and_then(|s| s.track).map(|t| t.file),
        Some("/m/two.mp3".to_string())
    );
}

#[tokio::test]
async fn controller_and_queue_share_the_store() {
    let player = FakePlayer::new(Vec::new());
    let store = Arc::new(StateStore::new());
    store.update(StatePatch::new().player_status(playing("/m/one.mp3", 12)));

    let controller = PlaybackController::new(player.clone(), store.clone());
    controller.skip_backward(20).await.unwrap();
    controller.volume_up(5).await.unwrap();
    assert_eq!(
        *player.sent.lock(),
        vec![RemoteCommand::Seek(0), RemoteCommand::Volume(75)]
    );

    let mut queue = QueueManager::new(store.clone());
    queue.add(TrackInfo::new("/m/one.mp3"), None);
    queue.add(TrackInfo::new("/m/two.mp3"), None);
    queue.save_as_playlist("pair");

    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    store.save(&path).unwrap();

    let restored = StateStore::new();
    restored.load(&path).unwrap();
    assert_eq!(
        restored.read(|state| state.playlists["pair"].clone()),
        ["/m/one.mp3", "/m/two.mp3"]
    );
}
