//! Single-instance guard backed by a pid file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why the instance lock could not be taken.
#[derive(Debug, Error)]
pub enum InstanceLockError {
    #[error("another instance is already running (pid {pid}, lock {path})")]
    AlreadyRunning { pid: u32, path: PathBuf },
    #[error("failed to write lock file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Holds the lock file for as long as it lives; dropping it removes the file.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// Claims `path` for the current process.
    ///
    /// A lock left behind by a process that is gone, or one that cannot be
    /// parsed, is replaced.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, InstanceLockError> {
        let path = path.into();
        if let Some(pid) = read_pid(&path) {
            if pid != std::process::id() && process_alive(pid) {
                return Err(InstanceLockError::AlreadyRunning { pid, path });
            }
            tracing::debug!(pid, path = %path.display(), "replacing stale instance lock");
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| InstanceLockError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, std::process::id().to_string()).map_err(|source| {
            InstanceLockError::Write {
                path: path.clone(),
                source,
            }
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(error = %e, path = %self.path.display(), "failed to remove instance lock");
            }
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// Without a cheap liveness check an existing lock is trusted.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lock_is_written_and_removed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("instance.lock");
        {
            let lock = InstanceLock::acquire(&path).unwrap();
            assert_eq!(read_pid(lock.path()), Some(std::process::id()));
        }
        assert!(!path.exists());
    }

    #[test]
    fn garbage_lock_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("instance.lock");
        fs::write(&path, "not a pid").unwrap();
        let _lock = InstanceLock::acquire(&path).unwrap();
        assert_eq!(read_pid(&path), Some(std::process::id()));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn live_foreign_pid_blocks_acquire() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("instance.lock");
        // pid 1 always exists on Linux.
        fs::write(&path, "1").unwrap();
        let err = InstanceLock::acquire(&path).unwrap_err();
        assert!(matches!(err, InstanceLockError::AlreadyRunning { pid: 1, .. }));
    }
}
