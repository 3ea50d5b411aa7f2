use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Highest volume accepted by the player, in percent.
pub const MAX_VOLUME: u8 = 100;

/// Transport state reported by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Stopped => "stopped",
        }
    }

    /// Parses the status word used by the player's query output.
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "playing" => Some(PlaybackStatus::Playing),
            "paused" => Some(PlaybackStatus::Paused),
            "stopped" => Some(PlaybackStatus::Stopped),
            _ => None,
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for one track as reported by the player.
///
/// The file path is the identity key: two values with the same `file` describe
/// the same track, possibly at different positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Duration in whole seconds when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    /// Playback position in whole seconds when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl TrackInfo {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            artist: None,
            album: None,
            title: None,
            genre: None,
            date: None,
            duration: None,
            position: None,
        }
    }

    /// True when both values refer to the same file.
    pub fn same_track(&self, other: &TrackInfo) -> bool {
        self.file == other.file
    }

    /// Title tag, falling back to the file name.
    pub fn display_title(&self) -> &str {
        if let Some(title) = self.title.as_deref() {
            return title;
        }
        Path::new(&self.file)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.file)
    }
}

/// One snapshot of the player's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub status: PlaybackStatus,
    pub track: Option<TrackInfo>,
    pub volume: u8,
    pub repeat: bool,
    pub shuffle: bool,
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            track: None,
            volume: MAX_VOLUME,
            repeat: false,
            shuffle: false,
        }
    }
}

impl PlayerStatus {
    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    pub fn current_file(&self) -> Option<&str> {
        self.track.as_ref().map(|track| track.file.as_str())
    }

    pub fn position(&self) -> u32 {
        self.track
            .as_ref()
            .and_then(|track| track.position)
            .unwrap_or(0)
    }
}
