use crate::{APP_AUTHOR, APP_NAME, APP_QUALIFIER};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const STATE_FILE: &str = "state.json";
const DISK_CACHE_DIR: &str = "entries";
const LOCK_FILE: &str = "instance.lock";

/// Where encore keeps its files.
///
/// Logs live under the data directory so that clearing the cache never
/// removes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    config_dir: PathBuf,
    data_dir: PathBuf,
    cache_dir: PathBuf,
    log_dir: PathBuf,
}

impl AppDirs {
    /// Platform directories (`~/.config/encore`, `~/.local/share/encore`, ... on Linux).
    pub fn discover() -> Result<Self, DirsError> {
        let project = ProjectDirs::from(APP_QUALIFIER, APP_AUTHOR, APP_NAME)
            .ok_or(DirsError::MissingProjectDirs)?;
        Ok(Self::from_parts(
            project.config_dir(),
            project.data_dir(),
            project.cache_dir(),
        ))
    }

    /// Every directory under one root.
    pub fn rooted(root: &Path) -> Self {
        Self::from_parts(&root.join("config"), &root.join("data"), &root.join("cache"))
    }

    fn from_parts(config: &Path, data: &Path, cache: &Path) -> Self {
        Self {
            config_dir: config.to_path_buf(),
            data_dir: data.to_path_buf(),
            cache_dir: cache.to_path_buf(),
            log_dir: data.join("logs"),
        }
    }

    /// Creates every directory; safe to call repeatedly.
    pub fn ensure_exists(&self) -> Result<(), DirsError> {
        [&self.config_dir, &self.data_dir, &self.cache_dir, &self.log_dir]
            .into_iter()
            .try_for_each(|dir| {
                std::fs::create_dir_all(dir).map_err(|source| DirsError::CreateDirectory {
                    path: dir.clone(),
                    source,
                })
            })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Durable state document (playlists, history, statistics, UI state).
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE)
    }

    /// Directory of the on-disk metadata cache.
    pub fn disk_cache_dir(&self) -> PathBuf {
        self.cache_dir.join(DISK_CACHE_DIR)
    }

    pub fn instance_lock_path(&self) -> PathBuf {
        self.cache_dir.join(LOCK_FILE)
    }
}

#[derive(Debug, Error)]
pub enum DirsError {
    #[error("no home directory; cannot place encore's files")]
    MissingProjectDirs,
    #[error("failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
}
