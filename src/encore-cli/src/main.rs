mod app;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, Subcommand};
use encore_core::{
    init_logging, AppDirs, Config, DiskCache, EventBus, EventKind, EventPayload, LogLevel,
    PlayerStatus, TrackInfo,
};
use encore_player::{
    PlaybackController, QueueManager, QueueStatistics, StatePatch, StateStore, TrackLibrary,
};
use encore_remote::{CmusRemote, PlayerControl};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "encore", version, about = "Companion controller for the cmus music player")]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level regardless of config
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum Command {
    /// Poll the player and run plugins until interrupted (default)
    Run,
    /// Print the player's current status
    Status,
    /// Start playback
    Play,
    /// Toggle pause
    Pause,
    Stop,
    Next,
    /// Previous track
    Prev,
    /// Seek to an absolute position
    Seek { seconds: u32 },
    /// Set the volume
    Volume {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
    /// Raise the volume by a step (default: playback.volume_step)
    VolumeUp { step: Option<u8> },
    /// Lower the volume by a step (default: playback.volume_step)
    VolumeDown { step: Option<u8> },
    /// Jump ahead in the current track (default: playback.seek_step seconds)
    SkipForward { seconds: Option<u32> },
    /// Jump back in the current track (default: playback.seek_step seconds)
    SkipBack { seconds: Option<u32> },
    /// Play queue helpers
    #[command(subcommand)]
    Queue(QueueCommand),
    /// Configuration file helpers
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Metadata cache maintenance
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum ConfigCommand {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print where the configuration is read from
    Path,
    /// Print the configured key bindings
    Keys,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum QueueCommand {
    /// Append files to the player's queue
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Shuffle the new files, pushing recently played ones to the end
        #[arg(long)]
        shuffle: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum CacheCommand {
    /// Delete every on-disk cache entry
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dirs = AppDirs::discover().context("failed to resolve application directories")?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| Config::config_path(&dirs));
    let command = cli.command.clone().unwrap_or(Command::Run);

    // These work on the files themselves, so they must not require a valid config.
    match &command {
        Command::Config(ConfigCommand::Path) => {
            println!("{}", config_path.display());
            return Ok(());
        }
        Command::Config(ConfigCommand::Init { force }) => {
            return init_config(&config_path, *force);
        }
        _ => {}
    }

    let config = load_config(&dirs, cli.config.as_deref())?;
    let level = cli.debug.then_some(LogLevel::Debug);
    let _logging = init_logging(&config.logging, &dirs, level)?;
    tracing::debug!(config = %config_path.display(), ?command, "starting");

    match command {
        Command::Run => run(config, config_path, dirs).await,
        Command::Cache(CacheCommand::Clear) => {
            let cache = DiskCache::new(dirs.disk_cache_dir())?;
            let removed = cache.clear().await?;
            println!("removed {removed} cache entries from {}", cache.dir().display());
            Ok(())
        }
        Command::Config(ConfigCommand::Keys) => {
            println!("{}", format_keybindings(&config.keybindings));
            Ok(())
        }
        Command::Config(_) => Ok(()),
        one_shot => {
            let remote = Arc::new(CmusRemote::new(config.player.clone()));
            remote
                .attach()
                .context("cmus does not appear to be running")?;
            let result = async {
                let session = OneShot::start(remote.clone(), &config, &dirs).await?;
                session.execute(&one_shot).await
            }
            .await;
            remote.disconnect().await;
            result
        }
    }
}

fn load_config(dirs: &AppDirs, explicit: Option<&Path>) -> Result<Config> {
    let config = match explicit {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load_or_default(dirs)?,
    };
    Ok(config)
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    Config::write_default(path)?;
    println!("wrote default configuration to {}", path.display());
    Ok(())
}

async fn run(config: Config, config_path: PathBuf, dirs: AppDirs) -> Result<()> {
    let signal = shutdown_signal().context("failed to install signal handlers")?;
    let remote = Arc::new(CmusRemote::new(config.player.clone()));
    let app = App::initialize(config, config_path, dirs, remote).await?;
    print_now_playing(app.bus());
    tracing::info!(
        plugins = ?app.plugins().loaded(),
        playlists = app.store().read(|state| state.playlists.len()),
        "ready"
    );

    let interrupt = async {
        let name = signal.await;
        tracing::info!(signal = name, "shutting down");
        app.request_shutdown();
    };
    tokio::join!(app.run(), interrupt);
    app.shutdown().await?;
    Ok(())
}

/// Resolves with the name of the first of SIGINT or SIGTERM to arrive.
///
/// The SIGTERM handler is registered before this returns, so a signal sent
/// while the app is still starting is not lost.
fn shutdown_signal() -> std::io::Result<impl Future<Output = &'static str>> {
    #[cfg(unix)]
    let mut sigterm =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for interrupt");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            sigterm.recv().await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => "SIGINT",
            _ = terminate => "SIGTERM",
        }
    })
}

/// Prints one line to stdout whenever the track changes.
fn print_now_playing(bus: &EventBus) {
    bus.subscribe_fn(EventKind::TrackChanged, |event| {
        if let EventPayload::TrackChanged { current, .. } = event.payload() {
            println!("{}", now_playing_line(current.as_ref()));
        }
        Ok(())
    });
}

fn now_playing_line(track: Option<&TrackInfo>) -> String {
    match track {
        Some(track) => format!("♪ {}", describe(track)),
        None => "♪ (nothing playing)".to_string(),
    }
}

fn describe(track: &TrackInfo) -> String {
    match track.artist.as_deref() {
        Some(artist) => format!("{artist} - {}", track.display_title()),
        None => track.display_title().to_string(),
    }
}

/// A single command against a running player.
///
/// Transport commands go through [`PlaybackController`] with the configured
/// steps, seeded with one status query so relative commands have a base.
struct OneShot {
    store: Arc<StateStore>,
    bus: EventBus,
    playback: PlaybackController,
    config: Config,
    dirs: AppDirs,
}

impl OneShot {
    async fn start(
        control: Arc<dyn PlayerControl>,
        config: &Config,
        dirs: &AppDirs,
    ) -> Result<Self> {
        let bus = EventBus::new();
        let store = Arc::new(StateStore::with_bus(bus.clone()));
        store.load(&dirs.state_path())?;
        store.update(StatePatch::new().player_status(control.status().await?));

        let playback = PlaybackController::new(control, Arc::clone(&store))
            .with_bus(bus.clone())
            .with_config(&config.playback);
        Ok(Self {
            store,
            bus,
            playback,
            config: config.clone(),
            dirs: dirs.clone(),
        })
    }

    async fn execute(&self, command: &Command) -> Result<()> {
        let steps = &self.config.playback;
        match command {
            Command::Status => {
                let status = self.store.player_status().unwrap_or_default();
                println!("{}", format_status(&status));
            }
            Command::Play => self.playback.play().await?,
            Command::Pause => self.playback.play_pause().await?,
            Command::Stop => self.playback.stop().await?,
            Command::Next => self.playback.next().await?,
            Command::Prev => self.playback.previous().await?,
            Command::Seek { seconds } => self.playback.seek(*seconds).await?,
            Command::Volume { percent } => self.playback.set_volume(*percent).await?,
            Command::VolumeUp { step } => {
                self.playback
                    .volume_up(step.unwrap_or(steps.volume_step))
                    .await?
            }
            Command::VolumeDown { step } => {
                self.playback
                    .volume_down(step.unwrap_or(steps.volume_step))
                    .await?
            }
            Command::SkipForward { seconds } => {
                self.playback
                    .skip_forward(seconds.unwrap_or(steps.seek_step))
                    .await?
            }
            Command::SkipBack { seconds } => {
                self.playback
                    .skip_backward(seconds.unwrap_or(steps.seek_step))
                    .await?
            }
            Command::Queue(QueueCommand::Add { files, shuffle }) => {
                let library =
                    TrackLibrary::from_config(&self.config.cache, &self.dirs.disk_cache_dir())?;
                let stats = self.queue_files(files, *shuffle, &library).await?;
                println!("{}", format_queue_summary(&stats));
            }
            Command::Run | Command::Config(_) | Command::Cache(_) => {}
        }
        let reported = self.bus.recent(EventKind::CommandExecuted, usize::MAX);
        tracing::debug!(commands = reported.len(), "one-shot finished");
        Ok(())
    }

    /// Resolves tags for `files`, orders them and hands them to the player.
    async fn queue_files(
        &self,
        files: &[PathBuf],
        shuffle: bool,
        library: &TrackLibrary,
    ) -> Result<QueueStatistics> {
        let mut queue = QueueManager::new(Arc::clone(&self.store));
        for record in self.store.read(|state| state.play_history.clone()) {
            queue.note_played(record.file);
        }
        for file in files {
            let path = std::path::absolute(file)
                .with_context(|| format!("failed to resolve {}", file.display()))?;
            queue.add(library.resolve(&path.to_string_lossy()).await, None);
        }
        if shuffle {
            queue.smart_shuffle();
        }
        for item in queue.items() {
            self.playback.enqueue(Path::new(&item.track.file)).await?;
        }
        tracing::debug!(tracks = queue.len(), "queued files");
        Ok(queue.statistics())
    }
}

fn format_status(status: &PlayerStatus) -> String {
    let mut lines = vec![format!("status: {}", status.status.as_str())];
    if let Some(track) = &status.track {
        lines.push(format!("track:  {}", describe(track)));
        if let Some(album) = &track.album {
            lines.push(format!("album:  {album}"));
        }
        lines.push(format!(
            "time:   {} / {}",
            clock(track.position.unwrap_or(0).into()),
            clock(track.duration.unwrap_or(0).into())
        ));
    }
    lines.push(format!("volume: {}%", status.volume));
    lines.push(format!(
        "repeat: {}  shuffle: {}",
        on_off(status.repeat),
        on_off(status.shuffle)
    ));
    lines.join("\n")
}

fn format_queue_summary(stats: &QueueStatistics) -> String {
    format!(
        "queued {} tracks ({} total, {} artists)",
        stats.total_tracks,
        clock(stats.total_duration),
        stats.artists.len()
    )
}

fn format_keybindings(bindings: &BTreeMap<String, String>) -> String {
    bindings
        .iter()
        .map(|(action, key)| format!("{action:<16} {key}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}
