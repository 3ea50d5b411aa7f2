use std::fmt;
use std::path::PathBuf;

/// One `cmus-remote` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    Play,
    /// Toggles pause.
    Pause,
    Stop,
    Next,
    Previous,
    /// Absolute seek in seconds.
    Seek(u32),
    /// Relative seek in seconds; negative values rewind.
    SeekRelative(i64),
    /// Volume in percent. Callers clamp before building this.
    Volume(u8),
    Query,
    ToggleRepeat,
    ToggleShuffle,
    Enqueue(PathBuf),
    Raw(Vec<String>),
}

impl RemoteCommand {
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::Play => vec!["-p".into()],
            Self::Pause => vec!["-u".into()],
            Self::Stop => vec!["-s".into()],
            Self::Next => vec!["-n".into()],
            Self::Previous => vec!["-r".into()],
            Self::Seek(seconds) => vec!["-k".into(), seconds.to_string()],
            Self::SeekRelative(delta) => vec!["-k".into(), format!("{delta:+}")],
            Self::Volume(percent) => vec!["-v".into(), format!("{percent}%")],
            Self::Query => vec!["-Q".into()],
            Self::ToggleRepeat => vec!["-R".into()],
            Self::ToggleShuffle => vec!["-S".into()],
            Self::Enqueue(path) => vec!["-q".into(), path.to_string_lossy().into_owned()],
            Self::Raw(args) => args.clone(),
        }
    }

    /// Short name used in logs and `CommandExecuted` events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::Seek(_) => "seek",
            Self::SeekRelative(_) => "seek_relative",
            Self::Volume(_) => "volume",
            Self::Query => "query",
            Self::ToggleRepeat => "toggle_repeat",
            Self::ToggleShuffle => "toggle_shuffle",
            Self::Enqueue(_) => "enqueue",
            Self::Raw(_) => "raw",
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.args().join(" "))
    }
}
