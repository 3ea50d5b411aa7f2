use crate::state::StateStore;
use encore_core::config::PlaybackConfig;
use encore_core::{Event, EventBus, EventPayload, MAX_VOLUME};
use encore_remote::{PlayerControl, RemoteResult};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const FADE_STEPS: u32 = 10;
const EVENT_SOURCE: &str = "playback";

/// User-level transport commands on top of [`PlayerControl`].
///
/// Relative commands (skip, volume steps, play/pause) read the last polled
/// status from the store. Each command is reported on the bus as
/// `CommandExecuted`.
pub struct PlaybackController {
    control: Arc<dyn PlayerControl>,
    store: Arc<StateStore>,
    bus: Option<EventBus>,
    crossfade: Duration,
}

impl PlaybackController {
    /// A controller with no bus and no crossfade.
    pub fn new(control: Arc<dyn PlayerControl>, store: Arc<StateStore>) -> Self {
        Self {
            control,
            store,
            bus: None,
            crossfade: Duration::ZERO,
        }
    }

    /// Reports every command on `bus` as `CommandExecuted`.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Total fade time around play/pause; zero disables fading.
    pub fn with_crossfade(mut self, crossfade: Duration) -> Self {
        self.crossfade = crossfade;
        self
    }

    /// Applies the configured crossfade.
    pub fn with_config(self, config: &PlaybackConfig) -> Self {
        self.with_crossfade(Duration::from_secs(u64::from(config.crossfade)))
    }

    /// Starts or resumes playback without fading.
    pub async fn play(&self) -> RemoteResult<()> {
        self.report("play", self.control.play()).await
    }

    /// Pauses when playing, otherwise starts playback.
    pub async fn play_pause(&self) -> RemoteResult<()> {
        self.report("play_pause", async {
            let status = self.store.player_status();
            match status {
                Some(status) if status.is_playing() => {
                    self.fade(status.volume, true).await?;
                    self.control.pause().await?;
                    if self.fading() {
                        // Leave the player at its old level for the next resume.
                        self.control.set_volume(status.volume).await?;
                    }
                    Ok(())
                }
                other => {
                    self.control.play().await?;
                    let target = other.map(|status| status.volume).unwrap_or(MAX_VOLUME);
                    self.fade(target, false).await
                }
            }
        })
        .await
    }

    /// Seeks forward from the current position. No-op without a current track.
    pub async fn skip_forward(&self, seconds: u32) -> RemoteResult<()> {
        let Some(position) = self.current_position() else {
            return Ok(());
        };
        self.report("skip_forward", self.control.seek(position.saturating_add(seconds)))
            .await
    }

    /// Seeks backward from the current position, stopping at zero.
    pub async fn skip_backward(&self, seconds: u32) -> RemoteResult<()> {
        let Some(position) = self.current_position() else {
            return Ok(());
        };
        self.report("skip_backward", self.control.seek(position.saturating_sub(seconds)))
            .await
    }

    /// Seeks to an absolute position in the current track.
    pub async fn seek(&self, seconds: u32) -> RemoteResult<()> {
        self.report("seek", self.control.seek(seconds)).await
    }

    /// No-op until a status has been polled.
    pub async fn volume_up(&self, step: u8) -> RemoteResult<()> {
        let Some(volume) = self.current_volume() else {
            return Ok(());
        };
        self.set_volume(volume.saturating_add(step)).await
    }

    /// No-op until a status has been polled.
    pub async fn volume_down(&self, step: u8) -> RemoteResult<()> {
        let Some(volume) = self.current_volume() else {
            return Ok(());
        };
        self.set_volume(volume.saturating_sub(step)).await
    }

    /// Sets an absolute volume, clamped to 0..=100.
    pub async fn set_volume(&self, percent: u8) -> RemoteResult<()> {
        self.report("volume", self.control.set_volume(percent.min(MAX_VOLUME)))
            .await
    }

    /// Skips to the next track.
    pub async fn next(&self) -> RemoteResult<()> {
        self.report("next", self.control.next()).await
    }

    /// Returns to the previous track.
    pub async fn previous(&self) -> RemoteResult<()> {
        self.report("previous", self.control.previous()).await
    }

    pub async fn stop(&self) -> RemoteResult<()> {
        self.report("stop", self.control.stop()).await
    }

    /// Appends a file to the player's own queue.
    pub async fn enqueue(&self, path: &Path) -> RemoteResult<()> {
        self.report("enqueue", self.control.enqueue(path)).await
    }

    fn fading(&self) -> bool {
        !self.crossfade.is_zero()
    }

    /// Steps the volume linearly down from `volume` to zero, or up from zero to it.
    async fn fade(&self, volume: u8, out: bool) -> RemoteResult<()> {
        if !self.fading() {
            return Ok(());
        }
        let step_delay = self.crossfade / FADE_STEPS;
        for step in 1..=FADE_STEPS {
            let fraction = if out { FADE_STEPS - step } else { step };
            let level = u32::from(volume) * fraction / FADE_STEPS;
            self.control.set_volume(level as u8).await?;
            tokio::time::sleep(step_delay).await;
        }
        Ok(())
    }

    fn current_position(&self) -> Option<u32> {
        self.store.read(|state| {
            let status = state.player_status.as_ref()?;
            status.track.as_ref()?;
            Some(status.position())
        })
    }

    fn current_volume(&self) -> Option<u8> {
        self.store
            .read(|state| state.player_status.as_ref().map(|status| status.volume))
    }

    async fn report<F>(&self, command: &str, action: F) -> RemoteResult<()>
    where
        F: Future<Output = RemoteResult<()>>,
    {
        let result = action.await;
        if let Err(e) = &result {
            tracing::warn!(command, error = %e, "player command failed");
        }
        if let Some(bus) = &self.bus {
            bus.emit(
                Event::new(EventPayload::CommandExecuted {
                    command: command.to_string(),
                    success: result.is_ok(),
                })
                .with_source(EVENT_SOURCE),
            );
        }
        result
    }
}
