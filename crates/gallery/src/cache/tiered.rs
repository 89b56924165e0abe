//! # Tiered Cache
//!
//! Coordinates the memory and disk tiers: reads go memory then disk, and a
//! disk hit is promoted into memory.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::cache::providers::CacheTier;
use crate::cache::types::{CacheKey, CacheResult, VariantClass};

#[derive(Clone)]
pub struct TieredCache {
    memory: Arc<dyn CacheTier>,
    disk: Arc<dyn CacheTier>,
}

impl TieredCache {
    pub fn new(memory: Arc<dyn CacheTier>, disk: Arc<dyn CacheTier>) -> Self {
        Self { memory, disk }
    }

    /// Get a value from the cache
    pub async fn lookup(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        // Check memory first
        if let Some(data) = self.memory.get(key).await? {
            return Ok(Some(data));
        }

        // Fall back to disk and promote the hit
        if let Some(data) = self.disk.get(key).await? {
            debug!(url = %key.url, variant = ?key.variant, "Promoting disk hit to memory");
            self.memory.put(key, data.clone()).await?;
            return Ok(Some(data));
        }

        Ok(None)
    }

    /// Store a value in both tiers, disk first
    pub async fn store(&self, key: &CacheKey, data: Bytes) -> CacheResult<()> {
        self.disk.put(key, data.clone()).await?;
        self.memory.put(key, data).await
    }

    /// Remove a key from both tiers
    pub async fn remove(&self, key: &CacheKey) -> CacheResult<()> {
        let memory_result = self.memory.remove(key).await;
        let disk_result = self.disk.remove(key).await;

        // Disk error wins over memory error
        disk_result.and(memory_result)
    }

    /// Clear one variant class in both tiers
    pub async fn clear(&self, class: VariantClass) -> CacheResult<()> {
        let memory_result = self.memory.clear(class).await;
        let disk_result = self.disk.clear(class).await;

        disk_result.and(memory_result)
    }
}
