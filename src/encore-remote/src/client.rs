use crate::control::PlayerControl;
use crate::session::{default_socket_paths, discover};
use crate::status::parse_status;
use crate::{RemoteCommand, RemoteError, RemoteResult};
use async_trait::async_trait;
use encore_core::{PlayerConfig, PlayerStatus};
use parking_lot::Mutex;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Adapter that drives cmus through `cmus-remote`.
///
/// Each command is a separate `cmus-remote --server <socket>` process. When no
/// session is found at connect time the player itself is started in listening
/// mode and owned by this adapter until [`disconnect`](Self::disconnect).
#[derive(Debug)]
pub struct CmusRemote {
    config: PlayerConfig,
    socket: Mutex<Option<PathBuf>>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl CmusRemote {
    /// Creates a disconnected adapter; nothing is spawned until [`connect`](Self::connect).
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            socket: Mutex::new(None),
            child: tokio::sync::Mutex::new(None),
        }
    }

    /// Socket of the current session, if any.
    pub fn socket_path(&self) -> Option<PathBuf> {
        self.socket.lock().clone()
    }

    fn candidates(&self) -> Vec<PathBuf> {
        if self.config.socket_paths.is_empty() {
            default_socket_paths()
        } else {
            self.config.socket_paths.clone()
        }
    }

    fn command_timeout(&self) -> Option<Duration> {
        self.config.command_timeout_ms.map(Duration::from_millis)
    }

    /// Uses an already running session without starting the player.
    pub fn attach(&self) -> RemoteResult<PathBuf> {
        let path = discover(&self.candidates()).ok_or(RemoteError::NotConnected)?;
        tracing::debug!(socket = %path.display(), "found player session");
        *self.socket.lock() = Some(path.clone());
        Ok(path)
    }

    /// Finds a running session, or starts the player and waits for one.
    pub async fn connect(&self) -> RemoteResult<PathBuf> {
        if let Ok(path) = self.attach() {
            return Ok(path);
        }
        let candidates = self.candidates();

        let listen_path = PathBuf::from(&self.config.listen_path);
        let child = Command::new(&self.config.program)
            .arg("--listen")
            .arg(&listen_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RemoteError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;
        tracing::info!(
            program = %self.config.program,
            listen = %listen_path.display(),
            "started player"
        );
        *self.child.lock().await = Some(child);

        let mut watched = Vec::with_capacity(candidates.len() + 1);
        watched.push(listen_path.clone());
        watched.extend(candidates);

        let delay = Duration::from_millis(self.config.connect_delay_ms);
        for attempt in 1..=self.config.connect_attempts {
            tokio::time::sleep(delay).await;
            if let Some(path) = discover(&watched) {
                tracing::info!(socket = %path.display(), attempt, "player session ready");
                *self.socket.lock() = Some(path.clone());
                return Ok(path);
            }
            tracing::debug!(attempt, "waiting for player session");
        }

        self.reap_child().await;
        Err(RemoteError::Connection {
            listen_path,
            attempts: self.config.connect_attempts,
        })
    }

    /// Runs `cmus-remote` against the current session and returns its stdout.
    pub async fn execute(&self, args: &[String]) -> RemoteResult<String> {
        let socket = self.socket_path().ok_or(RemoteError::NotConnected)?;
        let command_line = args.join(" ");

        let mut command = Command::new(&self.config.remote_program);
        command
            .arg("--server")
            .arg(&socket)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = with_timeout(self.command_timeout(), &command_line, command.output())
            .await?
            .map_err(|source| RemoteError::Spawn {
                program: self.config.remote_program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RemoteError::CommandFailed {
                command: command_line,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Forgets the session and stops the player if this adapter started it.
    pub async fn disconnect(&self) {
        self.socket.lock().take();
        self.reap_child().await;
    }

    /// Asks a player we started to quit, killing it if it outlives the grace period.
    async fn reap_child(&self) {
        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };
        let grace = Duration::from_millis(self.config.terminate_grace_ms);
        if request_terminate(&child) {
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::info!(%status, "player process exited");
                    return;
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "failed to wait for player process");
                    return;
                }
                Err(_) => tracing::warn!(
                    grace_ms = self.config.terminate_grace_ms,
                    "player ignored SIGTERM; killing it"
                ),
            }
        }
        if let Err(e) = child.start_kill() {
            tracing::debug!(error = %e, "player process already gone");
        }
        match child.wait().await {
            Ok(status) => tracing::info!(%status, "player process exited"),
            Err(e) => tracing::warn!(error = %e, "failed to wait for player process"),
        }
    }
}

/// Sends SIGTERM so the player can save its own state before exiting.
#[cfg(unix)]
fn request_terminate(child: &Child) -> bool {
    let Some(pid) = child.id().and_then(|id| libc::pid_t::try_from(id).ok()) else {
        return false;
    };
    // SAFETY: `kill` takes no pointers, and the child has not been reaped so the pid is still ours.
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        return true;
    }
    tracing::debug!(
        pid,
        error = %std::io::Error::last_os_error(),
        "failed to send SIGTERM to player"
    );
    false
}

#[cfg(not(unix))]
fn request_terminate(_child: &Child) -> bool {
    false
}

#[async_trait]
impl PlayerControl for CmusRemote {
    fn is_connected(&self) -> bool {
        self.socket.lock().is_some()
    }

    async fn connect(&self) -> RemoteResult<()> {
        CmusRemote::connect(self).await.map(drop)
    }

    async fn disconnect(&self) {
        CmusRemote::disconnect(self).await
    }

    async fn send(&self, command: RemoteCommand) -> RemoteResult<String> {
        self.execute(&command.args()).await
    }

    async fn status(&self) -> RemoteResult<PlayerStatus> {
        let output = self.send(RemoteCommand::Query).await?;
        Ok(parse_status(&output))
    }
}

async fn with_timeout<F: Future>(
    timeout: Option<Duration>,
    command: &str,
    future: F,
) -> RemoteResult<F::Output> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| RemoteError::Timeout {
                command: command.to_string(),
                timeout: limit,
            }),
        None => Ok(future.await),
    }
}
