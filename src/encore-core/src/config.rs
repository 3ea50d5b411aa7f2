use crate::paths::AppDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

const CURRENT_CONFIG_VERSION: u32 = 1;

/// Polling faster than this would only burn CPU in the player's remote binary.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How often the config watcher checks the file's modification time.
pub const CONFIG_WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Everything read from `config.toml`. Missing sections take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default = "default_keybindings")]
    pub keybindings: BTreeMap<String, String>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            general: GeneralConfig::default(),
            ui: UiConfig::default(),
            playback: PlaybackConfig::default(),
            library: LibraryConfig::default(),
            keybindings: default_keybindings(),
            network: NetworkConfig::default(),
            cache: CacheConfig::default(),
            player: PlayerConfig::default(),
            plugins: PluginsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Process-wide behaviour such as persistence cadence and config reloading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub theme: String,
    pub single_instance: bool,
    pub auto_save: bool,
    /// Seconds between periodic saves of the durable state.
    pub save_interval: u64,
    pub hot_reload: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            theme: "default".into(),
            single_instance: true,
            auto_save: true,
            save_interval: 300,
            hot_reload: true,
        }
    }
}

/// Display settings. `refresh_rate` and `poll_backoff` also drive the poller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Seconds between status polls.
    pub refresh_rate: f64,
    /// Seconds to wait after a failed poll.
    pub poll_backoff: f64,
    pub default_view: String,
    pub show_album_art: bool,
    pub show_visualizer: bool,
    pub show_lyrics: bool,
    pub layout: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            refresh_rate: 0.1,
            poll_backoff: 1.0,
            default_view: "dashboard".into(),
            show_album_art: true,
            show_visualizer: true,
            show_lyrics: true,
            layout: "default".into(),
        }
    }
}

/// Defaults for transport commands issued through the playback controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Fade length in seconds applied around play/pause; 0 disables fading.
    pub crossfade: u32,
    pub gapless: bool,
    pub replay_gain: bool,
    pub replay_gain_mode: String,
    pub seek_step: u32,
    pub volume_step: u8,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            crossfade: 0,
            gapless: true,
            replay_gain: true,
            replay_gain_mode: "album".into(),
            seek_step: 10,
            volume_step: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub paths: Vec<String>,
    pub auto_scan: bool,
    pub scan_interval: u64,
    pub watch_changes: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            paths: vec!["~/Music".into()],
            auto_scan: true,
            scan_interval: 3600,
            watch_changes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub timeout: u64,
    pub retry_count: u32,
    pub cache_size_mb: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: 10,
            retry_count: 3,
            cache_size_mb: 50,
        }
    }
}

/// Sizing for the track metadata cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub memory_capacity: usize,
    pub ttl_seconds: u64,
    pub disk: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: 1000,
            ttl_seconds: 3600,
            disk: true,
        }
    }
}

/// How to find, start and drive the external player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub program: String,
    pub remote_program: String,
    /// Socket the player is told to listen on when we start it ourselves.
    pub listen_path: String,
    /// Discovery paths checked in order; empty means the built-in list.
    pub socket_paths: Vec<PathBuf>,
    pub connect_attempts: u32,
    pub connect_delay_ms: u64,
    /// Upper bound for one remote command; unset means wait indefinitely.
    pub command_timeout_ms: Option<u64>,
    /// How long a player we started gets to exit after SIGTERM before it is killed.
    pub terminate_grace_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: "cmus".into(),
            remote_program: "cmus-remote".into(),
            listen_path: "/tmp/cmus-socket".into(),
            socket_paths: Vec::new(),
            connect_attempts: 10,
            connect_delay_ms: 500,
            command_timeout_ms: None,
            terminate_grace_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    pub enabled: Vec<String>,
}

/// Where and how verbosely to log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
    #[serde(default = "default_stdout_enabled")]
    pub stdout: bool,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_log_files: default_max_log_files(),
            stdout: default_stdout_enabled(),
            file_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Refresh cadence handed to the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub refresh_interval: Duration,
    pub backoff_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Config::default().poll_settings()
    }
}

/// Failure to read, parse or write the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize default config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config validation failed: {0}")]
    Validation(ValidationError),
    #[error("failed to prepare configuration directories: {0}")]
    Directories(#[from] crate::paths::DirsError),
}

/// A value that parsed but cannot be used.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unsupported config_version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("{field} must be a positive number of seconds, got {value}")]
    NonPositiveInterval { field: &'static str, value: f64 },
    #[error("player.connect_attempts must be at least 1")]
    NoConnectAttempts,
}

impl Config {
    pub fn load_or_default(dirs: &AppDirs) -> Result<Self, ConfigError> {
        dirs.ensure_exists()?;
        let path = Self::config_path(dirs);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Reads and validates one file. A missing file is an error here.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Writes the default document to `path`, creating parent directories.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let contents = toml::to_string_pretty(&Config::default())?;
        fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Platform default location of `config.toml`.
    pub fn config_path(dirs: &AppDirs) -> PathBuf {
        dirs.config_dir().join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.config_version != CURRENT_CONFIG_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                found: self.config_version,
                expected: CURRENT_CONFIG_VERSION,
            });
        }
        for (field, value) in [
            ("ui.refresh_rate", self.ui.refresh_rate),
            ("ui.poll_backoff", self.ui.poll_backoff),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ValidationError::NonPositiveInterval { field, value });
            }
        }
        if self.player.connect_attempts == 0 {
            return Err(ValidationError::NoConnectAttempts);
        }
        Ok(())
    }

    /// Poll cadence derived from the UI section.
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            refresh_interval: seconds(self.ui.refresh_rate),
            backoff_interval: seconds(self.ui.poll_backoff),
        }
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value)
        .unwrap_or(MIN_POLL_INTERVAL)
        .max(MIN_POLL_INTERVAL)
}

/// Reloads the config file when its modification time changes.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    interval: Duration,
    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_modified = modified_time(&path);
        Self {
            path,
            interval: CONFIG_WATCH_INTERVAL,
            last_modified,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Returns the freshly loaded config when the file changed since the last check.
    ///
    /// A file that no longer parses is logged and skipped; the caller keeps
    /// whatever config it already has.
    pub fn check(&mut self) -> Option<Config> {
        let modified = modified_time(&self.path)?;
        if self.last_modified == Some(modified) {
            return None;
        }
        self.last_modified = Some(modified);
        match Config::load_from(&self.path) {
            Ok(config) => {
                tracing::info!(path = %self.path.display(), "configuration reloaded");
                Some(config)
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring invalid configuration change");
                None
            }
        }
    }

    /// Publishes every successful reload on `updates` until `shutdown` fires.
    pub async fn watch(mut self, updates: watch::Sender<Config>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            if let Some(config) = self.check() {
                updates.send_replace(config);
            }
        }
        tracing::debug!("config watcher stopped");
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

fn default_config_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn default_keybindings() -> BTreeMap<String, String> {
    [
        ("play_pause", "space"),
        ("next_track", "n"),
        ("previous_track", "p"),
        ("volume_up", "+"),
        ("volume_down", "-"),
        ("seek_forward", "l"),
        ("seek_backward", "h"),
        ("search", "/"),
        ("command_palette", "ctrl+p"),
        ("quit", "q"),
        ("move_up", "k"),
        ("move_down", "j"),
    ]
    .into_iter()
    .map(|(action, key)| (action.to_string(), key.to_string()))
    .collect()
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_max_log_files() -> usize {
    7
}

fn default_stdout_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.max_log_files, 7);
        assert!(config.logging.stdout);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.keybindings.get("quit").map(String::as_str), Some("q"));
    }

    #[test]
    fn default_poll_settings_refresh_ten_times_a_second() {
        let settings = Config::default().poll_settings();
        assert_eq!(settings.refresh_interval, Duration::from_millis(100));
        assert_eq!(settings.backoff_interval, Duration::from_secs(1));
    }

    #[test]
    fn invalid_version_rejected() {
        let mut config = Config::default();
        config.config_version = CURRENT_CONFIG_VERSION + 1;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn zero_refresh_rate_rejected() {
        let mut config = Config::default();
        config.ui.refresh_rate = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::NonPositiveInterval { field: "ui.refresh_rate", .. })
        ));
    }

    #[test]
    fn partial_document_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[ui]
refresh_rate = 0.25

[player]
command_timeout_ms = 2000

[plugins]
enabled = ["now-playing"]
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.ui.refresh_rate, 0.25);
        assert_eq!(config.ui.poll_backoff, 1.0);
        assert_eq!(config.player.command_timeout_ms, Some(2000));
        assert_eq!(config.player.program, "cmus");
        assert_eq!(config.player.terminate_grace_ms, 3000);
        assert_eq!(config.plugins.enabled, vec!["now-playing".to_string()]);
        assert!(config.general.auto_save);
    }

    #[test]
    fn written_default_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::write_default(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn watcher_reports_changes_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::write_default(&path).unwrap();
        let mut watcher = ConfigWatcher::new(&path);
        assert!(watcher.check().is_none());

        let mut changed = Config::default();
        changed.ui.refresh_rate = 0.5;
        fs::write(&path, toml::to_string(&changed).unwrap()).unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();

        let reloaded = watcher.check().expect("change should be detected");
        assert_eq!(reloaded.ui.refresh_rate, 0.5);
        assert!(watcher.check().is_none());
    }

    #[test]
    fn watcher_skips_broken_documents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::write_default(&path).unwrap();
        let mut watcher = ConfigWatcher::new(&path);

        fs::write(&path, "[ui\nrefresh_rate = ").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();

        assert!(watcher.check().is_none());
    }
}
