use crate::state::{StatePatch, StateStore};
use encore_core::PollSettings;
use encore_remote::{PlayerControl, RemoteResult};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// What the poll loop is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Sleeping,
    Stopped,
}

/// Periodically copies the player's status into the [`StateStore`].
///
/// Intervals are read from a watch channel before every sleep, so a config
/// reload takes effect on the next cycle. Poll failures never end the loop;
/// only cancellation does, and an in-flight status query is awaited first.
pub struct Poller {
    control: Arc<dyn PlayerControl>,
    store: Arc<StateStore>,
    settings: watch::Receiver<PollSettings>,
    state: watch::Sender<PollerState>,
}

impl Poller {
    pub fn new(
        control: Arc<dyn PlayerControl>,
        store: Arc<StateStore>,
        settings: watch::Receiver<PollSettings>,
    ) -> Self {
        let (state, _) = watch::channel(PollerState::Idle);
        Self {
            control,
            store,
            settings,
            state,
        }
    }

    /// Watches the loop's connection state.
    pub fn state(&self) -> watch::Receiver<PollerState> {
        self.state.subscribe()
    }

    /// One query-and-store cycle.
    pub async fn poll_once(&self) -> RemoteResult<()> {
        let status = self.control.status().await?;
        self.store.update(StatePatch::new().player_status(status));
        Ok(())
    }

    /// Polls until `shutdown` fires, backing off while the player is unreachable.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut failures: u32 = 0;
        tracing::debug!("poller started");

        while !shutdown.is_cancelled() {
            self.state.send_replace(PollerState::Polling);
            let settings = *self.settings.borrow();
            let delay = match self.poll_once().await {
                Ok(()) => {
                    if failures > 0 {
                        tracing::info!(failures, "player status available again");
                        failures = 0;
                    }
                    settings.refresh_interval
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if failures == 1 {
                        tracing::warn!(
                            error = %e,
                            backoff = ?settings.backoff_interval,
                            "status poll failed; backing off"
                        );
                    } else {
                        tracing::debug!(error = %e, failures, "status poll still failing");
                    }
                    settings.backoff_interval
                }
            };

            self.state.send_replace(PollerState::Sleeping);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.state.send_replace(PollerState::Stopped);
        tracing::debug!("poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use encore_core::{PlaybackStatus, PlayerStatus};
    use encore_remote::{RemoteCommand, RemoteError};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Answers status queries from a script; `None` entries fail.
    struct Scripted {
        replies: Mutex<VecDeque<Option<PlayerStatus>>>,
        calls: Mutex<Vec<tokio::time::Instant>>,
    }

    impl Scripted {
        fn new(replies: Vec<Option<PlayerStatus>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PlayerControl for Scripted {
        fn is_connected(&self) -> bool {
            true
        }

        async fn send(&self, _command: RemoteCommand) -> RemoteResult<String> {
            Ok(String::new())
        }

        async fn status(&self) -> RemoteResult<PlayerStatus> {
            self.calls.lock().push(tokio::time::Instant::now());
            match self.replies.lock().pop_front().flatten() {
                Some(status) => Ok(status),
                None => Err(RemoteError::NotConnected),
            }
        }
    }

    fn settings() -> watch::Receiver<PollSettings> {
        let (tx, rx) = watch::channel(PollSettings {
            refresh_interval: Duration::from_millis(100),
            backoff_interval: Duration::from_secs(1),
        });
        // The last value stays readable after the sender is gone.
        drop(tx);
        rx
    }

    fn assert_gap(earlier: tokio::time::Instant, later: tokio::time::Instant, expected: Duration) {
        let gap = later - earlier;
        assert!(
            gap >= expected && gap < expected + Duration::from_millis(5),
            "gap {gap:?}, expected {expected:?}"
        );
    }

    fn playing() -> PlayerStatus {
        PlayerStatus {
            status: PlaybackStatus::Playing,
            ..PlayerStatus::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failures_back_off_and_loop_survives() {
        let control = Scripted::new(vec![None, Some(playing()), Some(playing())]);
        let store = Arc::new(StateStore::new());
        let poller = Arc::new(Poller::new(control.clone(), store.clone(), settings()));
        let shutdown = CancellationToken::new();

        let task = {
            let poller = Arc::clone(&poller);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { poller.run(shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(1_150)).await;
        shutdown.cancel();
        task.await.unwrap();

        let calls = control.calls.lock().clone();
        assert_eq!(calls.len(), 3);
        assert_gap(calls[0], calls[1], Duration::from_secs(1));
        assert_gap(calls[1], calls[2], Duration::from_millis(100));
        assert!(store.player_status().unwrap().is_playing());
        assert_eq!(*poller.state().borrow(), PollerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_changes_apply_on_next_cycle() {
        let control = Scripted::new(vec![Some(playing()); 4]);
        let store = Arc::new(StateStore::new());
        let (tx, rx) = watch::channel(PollSettings {
            refresh_interval: Duration::from_millis(100),
            backoff_interval: Duration::from_secs(1),
        });
        let poller = Poller::new(control.clone(), store, rx);
        let shutdown = CancellationToken::new();

        let run = poller.run(shutdown.clone());
        let drive = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send_replace(PollSettings {
                refresh_interval: Duration::from_millis(500),
                backoff_interval: Duration::from_secs(1),
            });
            tokio::time::sleep(Duration::from_millis(700)).await;
            shutdown.cancel();
        };
        tokio::join!(run, drive);

        let calls = control.calls.lock().clone();
        // Polls at 0 and 100ms; the sleep after the second already uses 500ms.
        assert_eq!(calls.len(), 3);
        assert_gap(calls[0], calls[1], Duration::from_millis(100));
        assert_gap(calls[1], calls[2], Duration::from_millis(500));
    }

    #[tokio::test]
    async fn cancelled_before_start_never_polls() {
        let control = Scripted::new(vec![Some(playing())]);
        let poller = Poller::new(control.clone(), Arc::new(StateStore::new()), settings());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        poller.run(shutdown).await;
        assert!(control.calls.lock().is_empty());
        assert_eq!(*poller.state().borrow(), PollerState::Stopped);
    }
}
