//! # Memory Tier
//!
//! In-memory cache using Moka, one cost-bounded LRU cache per variant class.

use bytes::Bytes;
use moka::future::Cache as MokaCache;
use moka::policy::EvictionPolicy;
use tracing::{debug, warn};

use crate::cache::providers::CacheTier;
use crate::cache::types::{CacheKey, CacheResult, MemoryCacheConfig, VariantClass};

#[derive(Clone)]
struct ClassCache {
    cache: MokaCache<CacheKey, Bytes>,
    /// Total cost ceiling in bytes, `None` for unbounded
    max_cost: Option<u64>,
}

impl ClassCache {
    fn new(max_cost: Option<u64>) -> Self {
        // Cost is the byte length of the entry
        let mut builder = MokaCache::builder()
            .weigher(|_k, v: &Bytes| v.len().try_into().unwrap_or(u32::MAX))
            .eviction_policy(EvictionPolicy::lru());

        if let Some(max_cost) = max_cost {
            builder = builder.max_capacity(max_cost);
        }

        Self {
            cache: builder.build(),
            max_cost,
        }
    }
}

/// Memory tier implementation using Moka
#[derive(Clone)]
pub struct MemoryTier {
    thumbnails: ClassCache,
    originals: ClassCache,
}

impl MemoryTier {
    pub fn new(config: &MemoryCacheConfig) -> Self {
        debug!(
            thumbnail_limit = ?config.thumbnail_cost_limit,
            original_limit = ?config.original_cost_limit,
            "Memory tier created"
        );

        Self {
            thumbnails: ClassCache::new(config.limit_for(VariantClass::Thumbnail)),
            originals: ClassCache::new(config.limit_for(VariantClass::Original)),
        }
    }

    fn class_cache(&self, class: VariantClass) -> &ClassCache {
        match class {
            VariantClass::Thumbnail => &self.thumbnails,
            VariantClass::Original => &self.originals,
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.class_cache(key.class()).cache.contains_key(key)
    }

    /// Total cost currently held for `class`
    pub fn weighted_size(&self, class: VariantClass) -> u64 {
        self.class_cache(class).cache.weighted_size()
    }

    /// Apply pending evictions and invalidations now
    pub async fn run_pending_tasks(&self) {
        self.thumbnails.cache.run_pending_tasks().await;
        self.originals.cache.run_pending_tasks().await;
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new(&MemoryCacheConfig::default())
    }
}

#[async_trait::async_trait]
impl CacheTier for MemoryTier {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        let hit = self.class_cache(key.class()).cache.get(key).await;
        debug!(url = %key.url, variant = ?key.variant, hit = hit.is_some(), "Memory tier lookup");
        Ok(hit)
    }

    async fn put(&self, key: &CacheKey, data: Bytes) -> CacheResult<()> {
        let class_cache = self.class_cache(key.class());
        let size = data.len() as u64;

        // A single entry shouldn't be larger than the whole budget
        if let Some(max_cost) = class_cache.max_cost.filter(|max| size > *max) {
            warn!(
                url = %key.url,
                size,
                max_cost,
                "Entry too large for memory tier, skipping"
            );
            return Ok(());
        }

        class_cache.cache.insert(key.clone(), data).await;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> CacheResult<()> {
        self.class_cache(key.class()).cache.invalidate(key).await;
        Ok(())
    }

    async fn clear(&self, class: VariantClass) -> CacheResult<()> {
        let class_cache = self.class_cache(class);
        class_cache.cache.invalidate_all();
        class_cache.cache.run_pending_tasks().await;

        debug!(class = ?class, "Memory tier cleared");
        Ok(())
    }
}
