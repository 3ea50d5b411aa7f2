use crate::state::{StatePatch, StateStore};
use encore_core::TrackInfo;
use rand::{seq::SliceRandom, thread_rng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

/// Files remembered for [`QueueManager::smart_shuffle`].
const SHUFFLE_MEMORY: usize = 50;

/// Stable handle for a queued item; never reused within one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueId(pub u64);

impl QueueId {
    fn next(seed: &mut u64) -> Self {
        let id = *seed;
        *seed = seed.saturating_add(1);
        QueueId(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub id: QueueId,
    pub track: TrackInfo,
    /// Who queued it: `user` for manual additions, otherwise a plugin name.
    pub added_by: String,
    pub priority: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatistics {
    pub total_tracks: usize,
    /// Sum of known durations in seconds.
    pub total_duration: u64,
    pub genres: BTreeMap<String, usize>,
    pub artists: BTreeMap<String, usize>,
}

/// Ordered play queue.
///
/// Every mutation is mirrored into the store's `queue` field.
#[derive(Debug)]
pub struct QueueManager {
    store: Arc<StateStore>,
    items: Vec<QueueItem>,
    next_id: u64,
    recently_played: VecDeque<String>,
}

impl QueueManager {
    /// An empty queue mirrored into `store`.
    pub fn new(store: Arc<StateStore>) -> Self {
        Self {
            store,
            items: Vec::new(),
            next_id: 0,
            recently_played: VecDeque::with_capacity(SHUFFLE_MEMORY),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in play order.
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    /// Inserts at `position` (clamped to the end) or appends.
    pub fn add(&mut self, track: TrackInfo, position: Option<usize>) -> QueueId {
        self.add_item(track, "user", 0, position)
    }

    /// Inserts with an explicit origin and priority.
    pub fn add_item(
        &mut self,
        track: TrackInfo,
        added_by: impl Into<String>,
        priority: i32,
        position: Option<usize>,
    ) -> QueueId {
        let id = QueueId::next(&mut self.next_id);
        let item = QueueItem {
            id,
            track,
            added_by: added_by.into(),
            priority,
        };
        match position {
            Some(index) => self.items.insert(index.min(self.items.len()), item),
            None => self.items.push(item),
        }
        self.sync();
        id
    }

    /// Removes and returns the item at `index`, or `None` when out of range.
    pub fn remove(&mut self, index: usize) -> Option<QueueItem> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);
        self.sync();
        Some(removed)
    }

    /// Moves one item; does nothing unless both indices are in range.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from >= self.items.len() || to >= self.items.len() {
            return false;
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
        self.sync();
        true
    }

    /// Empties the queue.
    pub fn clear(&mut self) {
        self.items.clear();
        self.sync();
    }

    /// Stores the queue's file paths as a named playlist.
    pub fn save_as_playlist(&self, name: impl Into<String>) {
        let files = self
            .items
            .iter()
            .map(|item| item.track.file.clone())
            .collect();
        self.store.save_playlist(name, files);
    }

    /// Remembers a played file so [`smart_shuffle`](Self::smart_shuffle) can push it back.
    pub fn note_played(&mut self, file: impl Into<String>) {
        if self.recently_played.len() == SHUFFLE_MEMORY {
            self.recently_played.pop_front();
        }
        self.recently_played.push_back(file.into());
    }

    /// Shuffles tracks not heard recently and moves the recent ones to the end,
    /// keeping their relative order.
    pub fn smart_shuffle(&mut self) {
        if self.items.len() <= 1 {
            return;
        }
        let recent: HashSet<&str> = self.recently_played.iter().map(String::as_str).collect();
        let (mut fresh, stale): (Vec<_>, Vec<_>) = self
            .items
            .drain(..)
            .partition(|item| !recent.contains(item.track.file.as_str()));
        fresh.shuffle(&mut thread_rng());
        fresh.extend(stale);
        self.items = fresh;
        self.sync();
    }

    /// Track count, summed duration and per-genre and per-artist counts.
    pub fn statistics(&self) -> QueueStatistics {
        let mut stats = QueueStatistics {
            total_tracks: self.items.len(),
            ..QueueStatistics::default()
        };
        for track in self.items.iter().map(|item| &item.track) {
            stats.total_duration += u64::from(track.duration.unwrap_or(0));
            if let Some(genre) = &track.genre {
                *stats.genres.entry(genre.clone()).or_default() += 1;
            }
            if let Some(artist) = &track.artist {
                *stats.artists.entry(artist.clone()).or_default() += 1;
            }
        }
        stats
    }

    fn sync(&self) {
        let tracks = self.items.iter().map(|item| item.track.clone()).collect();
        self.store.update(StatePatch::new().queue(tracks));
    }
}
