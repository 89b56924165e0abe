//! # Disk Tier
//!
//! File-backed cache tier. Entries live in the namespace directory of their
//! variant class, named by [`CacheKey::to_filename`]. A file's modification
//! time is its last-access stamp and drives eviction.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use tokio::fs;
use tokio::io;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::providers::CacheTier;
use crate::cache::store::DiskStore;
use crate::cache::types::{CacheKey, CacheResult, DiskCacheConfig, VariantClass};

/// Hands out strictly increasing access stamps so that eviction order follows
/// access order even when the wall clock is coarse.
#[derive(Debug, Default)]
struct AccessClock {
    last: SyncMutex<Option<SystemTime>>,
}

impl AccessClock {
    fn next(&self) -> SystemTime {
        let mut last = self.last.lock();
        let now = SystemTime::now();
        let stamp = match *last {
            Some(previous) if now <= previous => previous + Duration::from_micros(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }
}

#[derive(Debug)]
struct EvictionCandidate {
    path: PathBuf,
    modified: SystemTime,
    name: String,
    size: u64,
}

#[derive(Debug, Clone)]
pub struct DiskTier {
    store: DiskStore,
    limits: DiskCacheConfig,
    /// One lock per namespace around every file operation in it
    thumbnails_lock: Arc<Mutex<()>>,
    originals_lock: Arc<Mutex<()>>,
    clock: Arc<AccessClock>,
}

impl DiskTier {
    pub fn new(store: DiskStore, limits: DiskCacheConfig) -> Self {
        Self {
            store,
            limits,
            thumbnails_lock: Arc::new(Mutex::new(())),
            originals_lock: Arc::new(Mutex::new(())),
            clock: Arc::new(AccessClock::default()),
        }
    }

    pub fn store(&self) -> &DiskStore {
        &self.store
    }

    fn lock_for(&self, class: VariantClass) -> &Mutex<()> {
        match class {
            VariantClass::Thumbnail => &self.thumbnails_lock,
            VariantClass::Original => &self.originals_lock,
        }
    }

    /// Set the file's modification time to a fresh access stamp
    async fn touch(&self, path: &Path) -> CacheResult<()> {
        let path = path.to_path_buf();
        let stamp = self.clock.next();
        tokio::task::spawn_blocking(move || {
            std::fs::File::options()
                .write(true)
                .open(&path)?
                .set_modified(stamp)
        })
        .await
        .map_err(io::Error::other)?
    }

    /// Total byte size of the regular files in `class`'s namespace
    pub async fn namespace_size(&self, class: VariantClass) -> CacheResult<u64> {
        let dir = self.store.ensure_namespace(class.namespace()).await?;
        let candidates = Self::list_entries(&dir).await?;
        Ok(candidates.iter().map(|c| c.size).sum())
    }

    async fn list_entries(dir: &Path) -> CacheResult<Vec<EvictionCandidate>> {
        let mut entries = fs::read_dir(dir).await?;
        let mut candidates = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            candidates.push(EvictionCandidate {
                path: entry.path(),
                modified: metadata.modified()?,
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
            });
        }

        Ok(candidates)
    }

    /// Delete the least recently accessed files of `class` until the
    /// namespace fits its limit. Returns the number of evicted files.
    ///
    /// The caller must hold the namespace lock.
    async fn trim(&self, class: VariantClass) -> CacheResult<usize> {
        let Some(limit) = self.limits.limit_for(class) else {
            return Ok(0);
        };

        let dir = self.store.namespace_dir(class.namespace());
        let mut candidates = Self::list_entries(&dir).await?;
        let mut total: u64 = candidates.iter().map(|c| c.size).sum();
        if total <= limit {
            return Ok(0);
        }

        // Oldest first, ties broken by file name
        candidates.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));

        let mut evicted = 0;
        for candidate in candidates {
            if total <= limit {
                break;
            }
            match fs::remove_file(&candidate.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = ?candidate.path, error = %e, "Failed to evict cache file");
                    return Err(e);
                }
            }
            total = total.saturating_sub(candidate.size);
            evicted += 1;
        }

        info!(
            namespace = %class.namespace(),
            evicted,
            remaining_bytes = total,
            limit,
            "Trimmed disk cache"
        );
        Ok(evicted)
    }
}

#[async_trait::async_trait]
impl CacheTier for DiskTier {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        let _guard = self.lock_for(key.class()).lock().await;
        self.store.ensure_namespace(key.variant.namespace()).await?;

        let path = self.store.entry_path(key);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(url = %key.url, variant = ?key.variant, "Disk tier miss");
                return Ok(None);
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to read cache file");
                return Err(e);
            }
        };

        self.touch(&path).await?;
        debug!(url = %key.url, variant = ?key.variant, bytes = data.len(), "Disk tier hit");
        Ok(Some(Bytes::from(data)))
    }

    async fn put(&self, key: &CacheKey, data: Bytes) -> CacheResult<()> {
        let class = key.class();
        let _guard = self.lock_for(class).lock().await;
        self.store.ensure_namespace(class.namespace()).await?;

        let path = self.store.entry_path(key);
        let temp_path = path.with_file_name(format!("{}.tmp", key.to_filename()));

        // Write to a temporary file then rename over the entry
        if let Err(e) = fs::write(&temp_path, &data).await {
            warn!(path = ?temp_path, error = %e, "Failed to write cache file");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            warn!(from = ?temp_path, to = ?path, error = %e, "Failed to rename temporary cache file");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
        self.touch(&path).await?;

        debug!(url = %key.url, variant = ?key.variant, bytes = data.len(), "Stored entry on disk");

        self.trim(class).await?;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> CacheResult<()> {
        let _guard = self.lock_for(key.class()).lock().await;

        let path = self.store.entry_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to remove cache file");
                Err(e)
            }
        }
    }

    async fn clear(&self, class: VariantClass) -> CacheResult<()> {
        let _guard = self.lock_for(class).lock().await;
        let dir = self.store.ensure_namespace(class.namespace()).await?;

        let mut removed = 0;
        for candidate in Self::list_entries(&dir).await? {
            fs::remove_file(&candidate.path).await?;
            removed += 1;
        }

        debug!(namespace = %class.namespace(), count = removed, "Cleared disk cache namespace");
        Ok(())
    }
}
