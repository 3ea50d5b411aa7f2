use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Result of a player operation.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Everything that can go wrong while talking to the player.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No session socket is known; connect or attach first.
    #[error("not connected to a player session")]
    NotConnected,
    /// The player was started but never opened its socket.
    #[error("player session at {listen_path} not reachable after {attempts} attempts")]
    Connection { listen_path: PathBuf, attempts: u32 },
    /// The player or `cmus-remote` binary could not be executed.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    /// `cmus-remote` ran but exited unsuccessfully.
    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    /// `cmus-remote` outlived the configured command timeout.
    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}
