//! Durable state persistence.
//!
//! Only the subset of [`AppState`](crate::AppState) that should survive a
//! restart is written: playlists, recent play history, statistics and the UI
//! view/search text. The previous file is kept as a backup and an unreadable
//! file is moved aside before falling back.

use crate::state::{PlayRecord, DEFAULT_VIEW, MAX_PLAY_HISTORY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Files larger than this are treated as corrupt.
const MAX_STATE_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Failure to read or write the state document.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to create state directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to write state file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to read state file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("corrupt state file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("state file too large ({size} bytes, max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiState {
    pub active_view: String,
    pub search_query: String,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            active_view: DEFAULT_VIEW.into(),
            search_query: String::new(),
        }
    }
}

/// On-disk document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DurableState {
    pub playlists: BTreeMap<String, Vec<String>>,
    pub play_history: Vec<PlayRecord>,
    pub statistics: BTreeMap<String, serde_json::Value>,
    pub ui_state: UiState,
}

impl DurableState {
    /// Drops all but the most recent history entries.
    fn trim_history(&mut self) {
        let len = self.play_history.len();
        if len > MAX_PLAY_HISTORY {
            self.play_history.drain(..len - MAX_PLAY_HISTORY);
        }
    }
}

/// Reads and atomically replaces the durable state document.
#[derive(Debug, Clone)]
pub struct StatePersistence {
    path: PathBuf,
    backup_path: PathBuf,
    corrupt_path: PathBuf,
}

impl StatePersistence {
    /// `path` is the primary file; backup and corrupt copies sit next to it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            backup_path: path.with_extension("backup.json"),
            corrupt_path: path.with_extension("corrupt.json"),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, state: &DurableState) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, &self.backup_path) {
                tracing::warn!(error = %e, "failed to back up state file; continuing anyway");
            }
        }

        let mut state = state.clone();
        state.trim_history();

        let file = fs::File::create(&self.path).map_err(|source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &state)
            .map_err(io::Error::other)
            .and_then(|()| writer.flush())
            .map_err(|source| PersistenceError::Write {
                path: self.path.clone(),
                source,
            })?;

        tracing::debug!(
            playlists = state.playlists.len(),
            history = state.play_history.len(),
            path = %self.path.display(),
            "saved state"
        );
        Ok(())
    }

    /// Loads the durable subset.
    ///
    /// A missing file is a first run and yields defaults. A corrupt file is
    /// moved aside and the backup is tried before falling back to defaults.
    pub fn load(&self) -> PersistenceResult<DurableState> {
        if !self.path.exists() {
            return Ok(DurableState::default());
        }

        match self.try_load(&self.path) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "state file is corrupt or unreadable; starting from defaults"
                );
                if let Err(move_err) = fs::rename(&self.path, &self.corrupt_path) {
                    tracing::warn!(error = %move_err, "failed to preserve corrupt state file");
                }

                if self.backup_path.exists() {
                    match self.try_load(&self.backup_path) {
                        Ok(state) => {
                            tracing::info!(
                                path = %self.backup_path.display(),
                                "recovered state from backup"
                            );
                            return Ok(state);
                        }
                        Err(backup_err) => {
                            tracing::warn!(error = %backup_err, "state backup also unreadable");
                        }
                    }
                }
                Ok(DurableState::default())
            }
        }
    }

    fn try_load(&self, path: &Path) -> PersistenceResult<DurableState> {
        let size = fs::metadata(path)
            .map_err(|source| PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        if size > MAX_STATE_FILE_SIZE {
            return Err(PersistenceError::FileTooLarge {
                size,
                max: MAX_STATE_FILE_SIZE,
            });
        }

        let file = fs::File::open(path).map_err(|source| PersistenceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut state: DurableState = serde_json::from_reader(BufReader::new(file)).map_err(
            |e| PersistenceError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        )?;
        state.trim_history();
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(n: u64) -> PlayRecord {
        PlayRecord {
            file: format!("/m/{n}.mp3"),
            artist: None,
            title: Some(format!("Song {n}")),
            played_at: n,
        }
    }

    fn sample() -> DurableState {
        let mut state = DurableState::default();
        state
            .playlists
            .insert("mix".into(), vec!["/m/a.mp3".into(), "/m/b.mp3".into()]);
        state.play_history = (0..3).map(record).collect();
        state
            .statistics
            .insert("tracks_played".into(), serde_json::json!(3));
        state.ui_state = UiState {
            active_view: "library".into(),
            search_query: "beatles".into(),
        };
        state
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path().join("state.json"));
        persistence.save(&sample()).unwrap();
        assert_eq!(persistence.load().unwrap(), sample());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path().join("nested/state.json"));
        let loaded = persistence.load().unwrap();
        assert_eq!(loaded, DurableState::default());
        assert_eq!(loaded.ui_state.active_view, DEFAULT_VIEW);
    }

    #[test]
    fn history_is_capped_on_save() {
        let dir = tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path().join("state.json"));
        let mut state = DurableState::default();
        state.play_history = (0..1_005).map(record).collect();
        persistence.save(&state).unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded.play_history.len(), MAX_PLAY_HISTORY);
        assert_eq!(loaded.play_history[0].played_at, 5);
        assert_eq!(loaded.play_history.last().unwrap().played_at, 1_004);
    }

    #[test]
    fn document_uses_documented_field_names() {
        let dir = tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path().join("state.json"));
        persistence.save(&sample()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(persistence.path()).unwrap()).unwrap();
        assert!(raw["playlists"]["mix"].is_array());
        assert!(raw["play_history"].is_array());
        assert_eq!(raw["statistics"]["tracks_played"], 3);
        assert_eq!(raw["ui_state"]["active_view"], "library");
        assert_eq!(raw["ui_state"]["search_query"], "beatles");
    }

    #[test]
    fn corrupt_file_is_preserved_and_defaults_used() {
        let dir = tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path().join("state.json"));
        fs::write(persistence.path(), "{ not json").unwrap();

        assert_eq!(persistence.load().unwrap(), DurableState::default());
        assert!(persistence.corrupt_path.exists());
        assert!(!persistence.path().exists());
    }

    #[test]
    fn recovers_from_backup() {
        let dir = tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path().join("state.json"));
        persistence.save(&sample()).unwrap();
        persistence.save(&DurableState::default()).unwrap();
        fs::write(persistence.path(), "garbage").unwrap();

        // The backup holds the state from before the second save.
        assert_eq!(persistence.load().unwrap(), sample());
    }

    #[test]
    fn partial_document_fills_defaults() {
        let dir = tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path().join("state.json"));
        fs::write(persistence.path(), r#"{"ui_state": {"search_query": "x"}}"#).unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded.ui_state.active_view, DEFAULT_VIEW);
        assert_eq!(loaded.ui_state.search_query, "x");
        assert!(loaded.playlists.is_empty());
    }
}
