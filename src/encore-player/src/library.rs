//! Tags for tracks the player has reported, keyed by file path.
//!
//! cmus only describes the current track, so files queued by path would
//! otherwise have no artist, title or duration. The library fills those in
//! from what was seen while they played.

use async_trait::async_trait;
use encore_core::{
    CacheConfig, CacheResult, Event, EventHandler, EventPayload, HandlerResult, TieredCache,
    TrackInfo,
};
use std::path::Path;

/// Metadata cache for tracks, keyed by file path.
pub struct TrackLibrary {
    cache: TieredCache<TrackInfo>,
}

impl TrackLibrary {
    pub fn new(cache: TieredCache<TrackInfo>) -> Self {
        Self { cache }
    }

    /// Memory tier sized from `config`, disk tier under `disk_dir` when enabled.
    pub fn from_config(config: &CacheConfig, disk_dir: &Path) -> CacheResult<Self> {
        TieredCache::from_config(config, disk_dir).map(Self::new)
    }

    /// Records `track`'s tags. The playback position is not kept.
    pub async fn remember(&self, track: &TrackInfo) {
        let mut entry = track.clone();
        entry.position = None;
        self.cache.set(&track.file, entry).await;
    }

    pub async fn lookup(&self, file: &str) -> Option<TrackInfo> {
        self.cache.get(file).await
    }

    /// Known tags for `file`, or a bare record carrying only the path.
    pub async fn resolve(&self, file: &str) -> TrackInfo {
        match self.lookup(file).await {
            Some(track) => track,
            None => {
                tracing::debug!(file, "no cached tags for track");
                TrackInfo::new(file)
            }
        }
    }

    pub async fn clear(&self) -> CacheResult<()> {
        self.cache.clear().await
    }
}

/// Remembers every track the player switches to.
#[async_trait]
impl EventHandler for TrackLibrary {
    async fn handle(&self, event: &Event) -> HandlerResult {
        if let EventPayload::TrackChanged {
            current: Some(track),
            ..
        } = event.payload()
        {
            self.remember(track).await;
        }
        Ok(())
    }
}
