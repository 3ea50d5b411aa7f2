use encore_core::{
    AppDirs, CacheError, Config, ConfigWatcher, DirsError, EventBus, EventKind, InstanceLock,
    InstanceLockError, PollSettings,
};
use encore_player::{Poller, StateError, StateStore, TrackLibrary};
use encore_plugin::{PluginContext, PluginManager, PluginRegistry};
use encore_remote::PlayerControl;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Startup and shutdown failures.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Directories(#[from] DirsError),
    #[error(transparent)]
    InstanceLock(#[from] InstanceLockError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub type AppResult<T> = Result<T, AppError>;

/// Owns the long-running pieces and their start/stop order.
pub struct App {
    config: Config,
    config_path: PathBuf,
    dirs: AppDirs,
    bus: EventBus,
    store: Arc<StateStore>,
    library: Arc<TrackLibrary>,
    control: Arc<dyn PlayerControl>,
    plugins: PluginManager,
    shutdown: CancellationToken,
    lock: Option<InstanceLock>,
}

impl App {
    /// Takes the instance lock, opens the track library, connects, restores
    /// durable state and loads plugins.
    ///
    /// An unreachable player is logged and tolerated; the poller keeps
    /// retrying on its backoff schedule.
    pub async fn initialize(
        config: Config,
        config_path: PathBuf,
        dirs: AppDirs,
        control: Arc<dyn PlayerControl>,
    ) -> AppResult<Self> {
        dirs.ensure_exists()?;
        let lock = if config.general.single_instance {
            Some(InstanceLock::acquire(dirs.instance_lock_path())?)
        } else {
            None
        };

        let bus = EventBus::new();
        let store = Arc::new(StateStore::with_bus(bus.clone()));
        let library = Arc::new(TrackLibrary::from_config(
            &config.cache,
            &dirs.disk_cache_dir(),
        )?);
        bus.subscribe(EventKind::TrackChanged, library.clone());

        if let Err(e) = control.connect().await {
            tracing::warn!(error = %e, "player unavailable; continuing without a session");
        }

        store.load(&dirs.state_path())?;

        let context = PluginContext {
            bus: bus.clone(),
            store: Arc::clone(&store),
        };
        let mut plugins = PluginManager::new(PluginRegistry::with_builtins(), context);
        let loaded = plugins.load_enabled(&config.plugins.enabled).await;
        tracing::info!(plugins = loaded, "encore initialized");

        Ok(Self {
            config,
            config_path,
            dirs,
            bus,
            store,
            library,
            control,
            plugins,
            shutdown: CancellationToken::new(),
            lock,
        })
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Tags of every track seen while running, shared with `queue add`.
    pub fn library(&self) -> &TrackLibrary {
        &self.library
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    /// Makes [`run`](Self::run) return once its tasks have stopped.
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Runs the background loops until shutdown is requested, then joins them.
    pub async fn run(&self) {
        let (settings_tx, settings_rx) = watch::channel(self.config.poll_settings());
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        let dispatch = {
            let bus = self.bus.clone();
            tokio::spawn(async move { bus.process().await })
        };

        let poller = Poller::new(
            Arc::clone(&self.control),
            Arc::clone(&self.store),
            settings_rx,
        );
        let token = self.shutdown.child_token();
        tasks.push(tokio::spawn(async move { poller.run(token).await }));

        if self.config.general.hot_reload {
            let (config_tx, config_rx) = watch::channel(self.config.clone());
            let watcher = ConfigWatcher::new(self.config_path.clone());
            tasks.push(tokio::spawn(
                watcher.watch(config_tx, self.shutdown.child_token()),
            ));
            tasks.push(tokio::spawn(forward_poll_settings(
                config_rx,
                settings_tx,
                self.shutdown.child_token(),
            )));
        }

        if self.config.general.auto_save {
            let every = Duration::from_secs(self.config.general.save_interval.max(1));
            tasks.push(tokio::spawn(auto_save(
                Arc::clone(&self.store),
                self.dirs.state_path(),
                every,
                self.shutdown.child_token(),
            )));
        }

        tracing::info!(tasks = tasks.len() + 1, "encore running");
        self.shutdown.cancelled().await;

        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "background task panicked");
            }
        }
        self.bus.stop();
        match dispatch.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "event dispatch stopped with an error"),
            Err(e) => tracing::error!(error = %e, "event dispatch panicked"),
        }
    }

    /// Stops everything in reverse start order and persists the durable state.
    ///
    /// Every step runs even when saving fails; the save error is returned last.
    pub async fn shutdown(mut self) -> AppResult<()> {
        self.shutdown.cancel();
        self.bus.stop();
        self.plugins.unload_all().await;

        let saved = self.store.save(&self.dirs.state_path());
        if let Err(e) = &saved {
            tracing::error!(error = %e, "failed to save state on shutdown");
        }

        self.control.disconnect().await;
        drop(self.lock.take());
        tracing::info!("encore stopped");
        saved.map_err(AppError::from)
    }
}

/// Hands each reloaded config's poll cadence to the poller.
async fn forward_poll_settings(
    mut configs: watch::Receiver<Config>,
    settings: watch::Sender<PollSettings>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = configs.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = configs.borrow_and_update().poll_settings();
                let updated = settings.send_if_modified(|current| {
                    if *current == next {
                        return false;
                    }
                    *current = next;
                    true
                });
                if updated {
                    tracing::info!(
                        refresh = ?next.refresh_interval,
                        backoff = ?next.backoff_interval,
                        "poll cadence updated"
                    );
                }
            }
        }
    }
}

async fn auto_save(
    store: Arc<StateStore>,
    path: PathBuf,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                match store.save(&path) {
                    Ok(()) => tracing::debug!(path = %path.display(), "state auto-saved"),
                    Err(e) => tracing::warn!(error = %e, "auto-save failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use encore_core::{PlaybackStatus, PlayerStatus, TrackInfo};
    use encore_plugin::NOW_PLAYING;
    use encore_remote::{RemoteCommand, RemoteError, RemoteResult};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeControl {
        refuse_connect: bool,
        connected: AtomicBool,
        disconnects: AtomicUsize,
    }

    #[async_trait]
    impl PlayerControl for FakeControl {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn connect(&self) -> RemoteResult<()> {
            if self.refuse_connect {
                return Err(RemoteError::NotConnected);
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) {
            self.connected.store(false, Ordering::SeqCst);
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }

        async fn send(&self, _command: RemoteCommand) -> RemoteResult<String> {
            Ok(String::new())
        }

        async fn status(&self) -> RemoteResult<PlayerStatus> {
            if !self.is_connected() {
                return Err(RemoteError::NotConnected);
            }
            Ok(PlayerStatus {
                status: PlaybackStatus::Playing,
                track: Some(TrackInfo::new("/m/song.mp3")),
                volume: 60,
                ..PlayerStatus::default()
            })
        }
    }

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.general.hot_reload = false;
        config.general.save_interval = 1;
        config.plugins.enabled = vec![NOW_PLAYING.to_string()];
        config
    }

    async fn start(dirs: &AppDirs, control: Arc<FakeControl>) -> App {
        App::initialize(
            quiet_config(),
            Config::config_path(dirs),
            dirs.clone(),
            control,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn initialize_restores_state_and_loads_plugins() {
        let root = tempdir().unwrap();
        let dirs = AppDirs::rooted(root.path());
        dirs.ensure_exists().unwrap();
        let previous = StateStore::new();
        previous.save_playlist("favourites", vec!["/m/a.mp3".into()]);
        previous.save(&dirs.state_path()).unwrap();

        let control = Arc::new(FakeControl::default());
        let app = start(&dirs, control.clone()).await;

        assert!(control.is_connected());
        assert!(dirs.instance_lock_path().exists());
        assert_eq!(app.plugins().loaded(), [NOW_PLAYING]);
        assert_eq!(
            app.store().read(|state| state.playlists["favourites"].clone()),
            ["/m/a.mp3"]
        );

        app.shutdown().await.unwrap();
        assert!(!dirs.instance_lock_path().exists());
        assert_eq!(control.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_player_is_not_fatal() {
        let root = tempdir().unwrap();
        let dirs = AppDirs::rooted(root.path());
        let control = Arc::new(FakeControl {
            refuse_connect: true,
            ..FakeControl::default()
        });

        let app = start(&dirs, control.clone()).await;
        assert!(!control.is_connected());
        app.shutdown().await.unwrap();
        assert!(dirs.state_path().exists());
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_and_saves_until_shutdown() {
        let root = tempdir().unwrap();
        let dirs = AppDirs::rooted(root.path());
        let app = start(&dirs, Arc::new(FakeControl::default())).await;

        tokio::join!(app.run(), async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            app.request_shutdown();
        });

        assert!(app.store().player_status().is_some_and(|s| s.is_playing()));
        assert_eq!(app.store().read(|state| state.play_history.len()), 1);
        assert!(dirs.state_path().exists());
        assert!(!app.bus().recent(EventKind::TrackChanged, 1).is_empty());
        assert!(app.library().lookup("/m/song.mp3").await.is_some());
        app.shutdown().await.unwrap();

        let reopened = TrackLibrary::from_config(&quiet_config().cache, &dirs.disk_cache_dir())
            .unwrap();
        assert!(reopened.lookup("/m/song.mp3").await.is_some());
    }

    #[tokio::test]
    async fn reloaded_config_changes_poll_cadence() {
        let (config_tx, config_rx) = watch::channel(Config::default());
        let (settings_tx, mut settings_rx) = watch::channel(Config::default().poll_settings());
        let shutdown = CancellationToken::new();
        let forward = tokio::spawn(forward_poll_settings(
            config_rx,
            settings_tx,
            shutdown.clone(),
        ));

        let mut faster = Config::default();
        faster.ui.refresh_rate = 0.25;
        config_tx.send_replace(faster);

        settings_rx.changed().await.unwrap();
        assert_eq!(
            settings_rx.borrow().refresh_interval,
            Duration::from_millis(250)
        );

        shutdown.cancel();
        forward.await.unwrap();
    }
}
