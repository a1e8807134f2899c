//! On-disk cache store.

use crate::CacheKey;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::instrument;

/// Name of the cache directory inside the configured cache location.
pub const CACHE_DIR_NAME: &str = "smb_cache";
/// Prefix of in-progress downloads. Never a valid [`CacheKey`].
const TEMP_PREFIX: &str = ".tmp-";
const MIB: u64 = 1024 * 1024;

/// Limits the store enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Eviction starts once the cache holds more than this.
    pub max_bytes: u64,
    /// Writes are refused unless at least this much is free on the volume.
    pub min_free_bytes: u64,
    /// Entries older than this are treated as missing.
    pub max_age: Duration,
}
impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_bytes: 500 * MIB,
            min_free_bytes: 100 * MIB,
            max_age: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// A file in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub path: PathBuf,
    pub size: u64,
    pub modified: OffsetDateTime,
}
impl CacheEntry {
    pub fn is_stale(&self, max_age: Duration) -> bool {
        // A modification time in the future counts as fresh.
        let age = Duration::try_from(OffsetDateTime::now_utc() - self.modified).unwrap_or_default();
        is_expired(age, max_age)
    }
}

/// Entries reaching `max_age` are stale.
fn is_expired(age: Duration, max_age: Duration) -> bool {
    age >= max_age
}

/// Outcome of an eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub removed: usize,
    pub bytes: u64,
}

/// Number and total size of cached files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheUsage {
    pub files: usize,
    pub bytes: u64,
}

/// Content-addressed file cache with a size budget and staleness limit.
///
/// Files are only ever created by renaming a fully written temporary file
/// over the final name, so a path returned by [`get()`](Self::get) or
/// [`put()`](Self::put) always refers to a complete file.
pub struct CacheStore {
    root: PathBuf,
    settings: CacheSettings,
    locks: KeyLocks,
}
impl CacheStore {
    /// Open (creating if needed) the cache under `location/smb_cache`.
    pub fn new(location: impl AsRef<Path>, settings: CacheSettings) -> Result<Self> {
        let root = location.as_ref().join(CACHE_DIR_NAME);
        // Use non-async here; it only happens once at startup.
        std::fs::create_dir_all(&root).map_err(ErrorKind::Io)?;
        Ok(Self { root, settings, locks: Mutex::default() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Path of the cached file for `key`, if present and fresh.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<PathBuf>> {
        let path = self.path_for(key);
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => exn::bail!(ErrorKind::Io(err)),
        };
        let modified = metadata.modified().map_err(ErrorKind::Io)?;
        // A modification time in the future counts as fresh.
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        if is_expired(age, self.settings.max_age) {
            tracing::debug!(%key, age_secs = age.as_secs(), "cache entry is stale");
            return Ok(None);
        }
        Ok(Some(path))
    }

    /// Store everything `reader` produces under `key`.
    ///
    /// Concurrent calls for the same key are serialized; a caller that had to
    /// wait gets the file the first one wrote. If the transfer fails, or the
    /// returned future is dropped, the partial file is removed and nothing
    /// appears under the final name.
    ///
    /// Fails with [`Capacity`](ErrorKind::Capacity) when eviction cannot bring
    /// the cache back under its budget, or the volume is short on space.
    #[instrument(skip(self, reader), fields(key = %key))]
    pub async fn put<R>(&self, key: &CacheKey, mut reader: R) -> Result<PathBuf>
    where
        R: AsyncRead + Unpin + Send,
    {
        let claim = self.claim(key);
        let _guard = claim.lock.lock().await;
        if let Some(path) = self.get(key).await? {
            return Ok(path);
        }
        self.evict_if_over_budget().await?;
        self.ensure_within_budget().await?;
        self.ensure_free_space()?;
        self.write(key, &mut reader).await
    }

    async fn write<R>(&self, key: &CacheKey, reader: &mut R) -> Result<PathBuf>
    where
        R: AsyncRead + Unpin + Send,
    {
        let temp = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(&self.root).map_err(ErrorKind::Io)?;
        // The temp path deletes the file when dropped: on error and on
        // cancellation alike.
        let (file, temp_path) = temp.into_parts();
        let mut file = fs::File::from_std(file);
        let copied =
            tokio::io::copy(reader, &mut file).await.or_raise(|| ErrorKind::CorruptTransfer(key.to_string()))?;
        file.flush().await.map_err(ErrorKind::Io)?;
        file.sync_all().await.map_err(ErrorKind::Io)?;
        drop(file);

        let path = self.path_for(key);
        temp_path.persist(&path).map_err(|err| ErrorKind::Io(err.error))?;
        tracing::info!(bytes = copied, path = %path.display(), "cached file");
        Ok(path)
    }

    async fn ensure_within_budget(&self) -> Result<()> {
        let used = self.usage().await?.bytes;
        let budget = self.settings.max_bytes;
        if used > budget {
            tracing::warn!(used, budget, "cache still over budget after eviction");
            exn::bail!(ErrorKind::Capacity { available: budget, required: used });
        }
        Ok(())
    }

    fn ensure_free_space(&self) -> Result<()> {
        let available = fs2::available_space(&self.root).map_err(ErrorKind::Io)?;
        let required = self.settings.min_free_bytes;
        if available < required {
            tracing::warn!(available, required, "not enough free space to cache");
            exn::bail!(ErrorKind::Capacity { available, required });
        }
        Ok(())
    }

    /// When the cache exceeds its budget, delete the oldest 30% of entries
    /// (by modification time, rounded up).
    #[instrument(skip(self))]
    pub async fn evict_if_over_budget(&self) -> Result<EvictionReport> {
        let mut entries = self.entries().await?;
        let total: u64 = entries.iter().map(|entry| entry.size).sum();
        if total <= self.settings.max_bytes {
            return Ok(EvictionReport::default());
        }
        entries.sort_by_key(|entry| entry.modified);
        let count = (entries.len() * 3).div_ceil(10);
        let mut report = EvictionReport::default();
        for entry in entries.into_iter().take(count) {
            match fs::remove_file(&entry.path).await {
                Ok(()) => {
                    report.removed += 1;
                    report.bytes += entry.size;
                },
                // Someone else got there first.
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
                Err(err) => tracing::warn!(path = %entry.path.display(), error = %err, "failed to evict"),
            }
        }
        tracing::info!(removed = report.removed, bytes = report.bytes, total, "evicted cache entries");
        Ok(report)
    }

    /// Delete every file in the cache directory, in-progress downloads
    /// included. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<usize> {
        let mut dir = fs::read_dir(&self.root).await.map_err(ErrorKind::Io)?;
        let mut removed = 0;
        while let Some(entry) = dir.next_entry().await.map_err(ErrorKind::Io)? {
            let path = entry.path();
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
                Err(err) => tracing::warn!(path = %path.display(), error = %err, "failed to remove cache file"),
            }
        }
        tracing::info!(removed, "cleared cache");
        Ok(removed)
    }

    /// Complete cache entries, reconstructed from the directory. Temporary
    /// and foreign files are ignored.
    pub async fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut dir = fs::read_dir(&self.root).await.map_err(ErrorKind::Io)?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(ErrorKind::Io)? {
            let Ok(key) = entry.file_name().to_string_lossy().parse::<CacheKey>() else {
                continue;
            };
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                // Vanished in the meantime, or not a file.
                _ => continue,
            };
            let modified = metadata.modified().map_err(ErrorKind::Io)?;
            entries.push(CacheEntry {
                key,
                path: entry.path(),
                size: metadata.len(),
                modified: modified.into(),
            });
        }
        Ok(entries)
    }

    pub async fn usage(&self) -> Result<CacheUsage> {
        let entries = self.entries().await?;
        Ok(CacheUsage {
            files: entries.len(),
            bytes: entries.iter().map(|entry| entry.size).sum(),
        })
    }

    fn claim(&self, key: &CacheKey) -> KeyClaim<'_> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = Arc::clone(locks.entry(key.clone()).or_default());
        KeyClaim { locks: &self.locks, key: key.clone(), lock }
    }
}

type KeyLocks = Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>;

/// Interest in a per-key lock. The map entry is removed when the last claim
/// goes away, however the holder finished (error and cancellation included).
struct KeyClaim<'a> {
    locks: &'a KeyLocks,
    key: CacheKey,
    lock: Arc<tokio::sync::Mutex<()>>,
}
impl Drop for KeyClaim<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this claim hold it: nobody is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}
