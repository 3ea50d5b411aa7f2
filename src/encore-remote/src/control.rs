use crate::{RemoteCommand, RemoteResult};
use async_trait::async_trait;
use encore_core::PlayerStatus;
use std::path::Path;

/// Typed control surface over a player session.
///
/// Implementors supply [`send`](PlayerControl::send) and
/// [`status`](PlayerControl::status); the transport primitives are thin
/// wrappers over `send`.
#[async_trait]
pub trait PlayerControl: Send + Sync {
    /// Whether a session is currently known; no command is sent.
    fn is_connected(&self) -> bool;

    /// Establishes a session. Adapters without one succeed immediately.
    async fn connect(&self) -> RemoteResult<()> {
        Ok(())
    }

    /// Drops the session and releases anything started for it.
    async fn disconnect(&self) {}

    /// Runs one command and returns its standard output.
    async fn send(&self, command: RemoteCommand) -> RemoteResult<String>;

    /// Queries and parses the current player state.
    async fn status(&self) -> RemoteResult<PlayerStatus>;

    /// Starts or resumes playback.
    async fn play(&self) -> RemoteResult<()> {
        self.send(RemoteCommand::Play).await.map(drop)
    }

    /// Toggles pause.
    async fn pause(&self) -> RemoteResult<()> {
        self.send(RemoteCommand::Pause).await.map(drop)
    }

    /// Stops playback and rewinds the current track.
    async fn stop(&self) -> RemoteResult<()> {
        self.send(RemoteCommand::Stop).await.map(drop)
    }

    /// Skips to the next track in the player's order.
    async fn next(&self) -> RemoteResult<()> {
        self.send(RemoteCommand::Next).await.map(drop)
    }

    /// Returns to the previous track.
    async fn previous(&self) -> RemoteResult<()> {
        self.send(RemoteCommand::Previous).await.map(drop)
    }

    /// Seeks to an absolute position in seconds.
    async fn seek(&self, seconds: u32) -> RemoteResult<()> {
        self.send(RemoteCommand::Seek(seconds)).await.map(drop)
    }

    /// Seeks relative to the current position; negative values rewind.
    async fn seek_relative(&self, delta: i64) -> RemoteResult<()> {
        self.send(RemoteCommand::SeekRelative(delta)).await.map(drop)
    }

    /// Sets the volume in percent; callers clamp to 0..=100.
    async fn set_volume(&self, percent: u8) -> RemoteResult<()> {
        self.send(RemoteCommand::Volume(percent)).await.map(drop)
    }

    /// Flips the repeat flag.
    async fn toggle_repeat(&self) -> RemoteResult<()> {
        self.send(RemoteCommand::ToggleRepeat).await.map(drop)
    }

    /// Flips the shuffle flag.
    async fn toggle_shuffle(&self) -> RemoteResult<()> {
        self.send(RemoteCommand::ToggleShuffle).await.map(drop)
    }

    /// Appends a file to the player's queue.
    async fn enqueue(&self, path: &Path) -> RemoteResult<()> {
        self.send(RemoteCommand::Enqueue(path.to_path_buf()))
            .await
            .map(drop)
    }
}
