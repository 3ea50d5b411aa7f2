use crate::registry::{Plugin, PluginContext, PluginDescriptor, PluginRegistry};
use async_trait::async_trait;
use encore_core::{Event, EventKind, EventPayload, HandlerResult, TrackInfo};
use parking_lot::Mutex;

pub const NOW_PLAYING: &str = "now-playing";

pub(crate) fn register(registry: &mut PluginRegistry) {
    let descriptor = PluginDescriptor::new(NOW_PLAYING, env!("CARGO_PKG_VERSION"))
        .capability(EventKind::TrackChanged)
        .capability(EventKind::PlaybackStarted)
        .capability(EventKind::PlaybackPaused)
        .capability(EventKind::PlaybackStopped);
    if let Err(e) = registry.register(descriptor, |_: &PluginContext| {
        Box::new(NowPlaying::default()) as Box<dyn Plugin>
    }) {
        tracing::warn!(error = %e, "built-in plugin not registered");
    }
}

/// Logs track and transport changes.
#[derive(Debug, Default)]
pub struct NowPlaying {
    last: Mutex<Option<String>>,
}

impl NowPlaying {
    /// Most recent line logged.
    pub fn last_line(&self) -> Option<String> {
        self.last.lock().clone()
    }

    fn line(event: &Event) -> Option<String> {
        match event.payload() {
            EventPayload::TrackChanged {
                current: Some(track),
                ..
            } => Some(format!("now playing: {}", describe(track))),
            EventPayload::TrackChanged { current: None, .. } => Some("no track".into()),
            EventPayload::PlaybackStarted { track } => Some(match track {
                Some(track) => format!("playing: {}", describe(track)),
                None => "playing".into(),
            }),
            EventPayload::PlaybackPaused { .. } => Some("paused".into()),
            EventPayload::PlaybackStopped { .. } => Some("stopped".into()),
            _ => None,
        }
    }
}

fn describe(track: &TrackInfo) -> String {
    match track.artist.as_deref() {
        Some(artist) => format!("{} - {}", artist, track.display_title()),
        None => track.display_title().to_string(),
    }
}

#[async_trait]
impl Plugin for NowPlaying {
    async fn initialize(&self) -> HandlerResult {
        tracing::debug!(plugin = NOW_PLAYING, "initialized");
        Ok(())
    }

    async fn on_event(&self, event: &Event) -> HandlerResult {
        if let Some(line) = Self::line(event) {
            tracing::info!(plugin = NOW_PLAYING, "{line}");
            *self.last.lock() = Some(line);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_core::PlaybackStatus;

    #[tokio::test]
    async fn formats_track_changes() {
        let plugin = NowPlaying::default();
        let mut track = TrackInfo::new("/m/Come Together.mp3");
        track.artist = Some("Beatles".into());
        plugin
            .on_event(&Event::new(EventPayload::TrackChanged {
                previous: None,
                current: Some(track),
            }))
            .await
            .unwrap();
        assert_eq!(
            plugin.last_line().as_deref(),
            Some("now playing: Beatles - Come Together.mp3")
        );

        plugin
            .on_event(&Event::new(EventPayload::PlaybackStopped {
                previous: PlaybackStatus::Playing,
            }))
            .await
            .unwrap();
        assert_eq!(plugin.last_line().as_deref(), Some("stopped"));
    }

    #[tokio::test]
    async fn ignores_unrelated_events() {
        let plugin = NowPlaying::default();
        plugin
            .on_event(&Event::new(EventPayload::QueueCleared))
            .await
            .unwrap();
        assert!(plugin.last_line().is_none());
    }
}
