//! Memoization for expensive lookups.
//!
//! Two tiers share one contract (`get`, `set`, `get_or_compute`, `clear`):
//! - [`MemoryCache`]: capacity-bounded, evicts the least recently accessed
//!   entry, and drops entries that have not been touched within the TTL.
//! - [`DiskCache`]: one file per key under a cache directory, named by the
//!   SHA-256 of the key. Unreadable files are deleted and reported as misses.
//!
//! [`TieredCache`] puts the memory tier in front of an optional disk tier.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::time::Instant;

use crate::config::CacheConfig;

const DISK_EXTENSION: &str = "cache";

/// Disk tier failures. Memory-tier operations cannot fail.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write cache file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to remove cache file {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
    #[error("failed to read cache directory {path}: {source}")]
    ReadDir { path: PathBuf, source: io::Error },
    #[error("failed to serialize cache value: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

struct MemoryEntry<V> {
    value: V,
    last_access: Instant,
    access_seq: u64,
}

struct MemoryState<V> {
    entries: HashMap<String, MemoryEntry<V>>,
    seq: u64,
}

impl<V> MemoryState<V> {
    fn tick(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

/// In-memory LRU cache with a time-to-live measured from the last access.
pub struct MemoryCache<V> {
    capacity: usize,
    ttl: Duration,
    state: Mutex<MemoryState<V>>,
}

impl<V: Clone> MemoryCache<V> {
    /// An empty cache holding at most `capacity` entries.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            state: Mutex::new(MemoryState {
                entries: HashMap::new(),
                seq: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a live entry and refreshes its access time; expired entries are dropped.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let seq = state.tick();
        match state.entries.get_mut(key) {
            Some(entry) if now.saturating_duration_since(entry.last_access) < self.ttl => {
                entry.last_access = now;
                entry.access_seq = seq;
                return Some(entry.value.clone());
            }
            Some(_) => {}
            None => return None,
        }
        state.entries.remove(key);
        tracing::trace!(key, "memory cache entry expired");
        None
    }

    /// Inserts or replaces, evicting the least recently used entry when full.
    pub fn set(&self, key: impl Into<String>, value: V) {
        if self.capacity == 0 {
            return;
        }
        let key = key.into();
        let mut state = self.state.lock();
        if !state.entries.contains_key(&key) && state.entries.len() >= self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.access_seq)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
                tracing::trace!(key = %oldest, "memory cache evicted least recently used entry");
            }
        }
        let access_seq = state.tick();
        state.entries.insert(
            key,
            MemoryEntry {
                value,
                last_access: Instant::now(),
                access_seq,
            },
        );
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.state.lock().entries.remove(key).map(|entry| entry.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    /// Returns the cached value or computes, stores and returns a new one.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = compute().await;
        self.set(key, value.clone());
        value
    }

    /// Like `get_or_compute`, but failed computations are not cached.
    pub async fn try_get_or_compute<F, Fut, E>(&self, key: &str, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = compute().await?;
        self.set(key, value.clone());
        Ok(value)
    }
}

#[derive(Serialize)]
struct DiskEntryRef<'a, V> {
    key: &'a str,
    value: &'a V,
}

#[derive(Deserialize)]
struct DiskEntry<V> {
    key: String,
    value: V,
}

/// Content-addressed on-disk cache that survives restarts.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Opens the cache directory, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> CacheResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds the value for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{:x}.{}", digest, DISK_EXTENSION))
    }

    /// Reads one entry. Unreadable or undecodable files are removed and count as misses.
    pub async fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "unreadable cache file; discarding");
                self.discard(&path).await;
                return None;
            }
        };

        match serde_json::from_slice::<DiskEntry<V>>(&bytes) {
            Ok(entry) if entry.key == key => Some(entry.value),
            Ok(entry) => {
                tracing::debug!(
                    expected = key,
                    found = %entry.key,
                    "cache file belongs to a different key; treating as miss"
                );
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "corrupt cache file; discarding");
                self.discard(&path).await;
                None
            }
        }
    }

    /// Serializes `value` as JSON into the key's file.
    pub async fn set<V: Serialize>(&self, key: &str, value: &V) -> CacheResult<()> {
        let path = self.path_for(key);
        let bytes = serde_json::to_vec(&DiskEntryRef { key, value })?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| CacheError::Write { path, source })
    }

    /// Deletes the entry for `key`. Returns false when there was none.
    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Remove { path, source }),
        }
    }

    /// Removes every cache file in the directory and returns how many were removed.
    pub async fn clear(&self) -> CacheResult<usize> {
        let mut entries =
            tokio::fs::read_dir(&self.dir)
                .await
                .map_err(|source| CacheError::ReadDir {
                    path: self.dir.clone(),
                    source,
                })?;
        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| CacheError::ReadDir {
                path: self.dir.clone(),
                source,
            })?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DISK_EXTENSION) {
                continue;
            }
            tokio::fs::remove_file(&path)
                .await
                .map_err(|source| CacheError::Remove {
                    path: path.clone(),
                    source,
                })?;
            removed += 1;
        }
        Ok(removed)
    }

    pub async fn get_or_compute<V, F, Fut>(&self, key: &str, compute: F) -> V
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(key).await {
            return value;
        }
        let value = compute().await;
        if let Err(e) = self.set(key, &value).await {
            tracing::warn!(error = %e, "failed to persist computed cache value");
        }
        value
    }

    async fn discard(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(error = %e, path = %path.display(), "failed to remove bad cache file");
            }
        }
    }
}

/// Memory tier backed by an optional disk tier.
pub struct TieredCache<V> {
    memory: MemoryCache<V>,
    disk: Option<DiskCache>,
}

impl<V> TieredCache<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    pub fn new(memory: MemoryCache<V>, disk: Option<DiskCache>) -> Self {
        Self { memory, disk }
    }

    /// Builds both tiers from configuration; the disk tier lives in `disk_dir`.
    pub fn from_config(config: &CacheConfig, disk_dir: &Path) -> CacheResult<Self> {
        let memory = MemoryCache::new(
            config.memory_capacity,
            Duration::from_secs(config.ttl_seconds),
        );
        let disk = if config.disk {
            Some(DiskCache::new(disk_dir)?)
        } else {
            None
        };
        Ok(Self::new(memory, disk))
    }

    pub fn memory(&self) -> &MemoryCache<V> {
        &self.memory
    }

    pub fn disk(&self) -> Option<&DiskCache> {
        self.disk.as_ref()
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        if let Some(value) = self.memory.get(key) {
            return Some(value);
        }
        let disk = self.disk.as_ref()?;
        let value: V = disk.get(key).await?;
        self.memory.set(key, value.clone());
        Some(value)
    }

    pub async fn set(&self, key: &str, value: V) {
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.set(key, &value).await {
                tracing::warn!(error = %e, "failed to write disk cache entry");
            }
        }
        self.memory.set(key, value);
    }

    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(key).await {
            return value;
        }
        let value = compute().await;
        self.set(key, value.clone()).await;
        value
    }

    pub async fn clear(&self) -> CacheResult<()> {
        self.memory.clear();
        if let Some(disk) = &self.disk {
            let removed = disk.clear().await?;
            tracing::debug!(removed, "cleared disk cache");
        }
        Ok(())
    }
}
