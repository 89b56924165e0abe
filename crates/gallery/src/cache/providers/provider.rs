//! # Cache Tier
//!
//! The contract both the memory and the disk tier implement.

use async_trait::async_trait;
use bytes::Bytes;

use crate::cache::types::{CacheKey, CacheResult, VariantClass};

/// One layer of the content cache.
///
/// A missing key is `Ok(None)`, never an error. Implementations serialise
/// their own mutations so concurrent calls on one key cannot interleave.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Get an entry from the tier
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>>;

    /// Put an entry into the tier, replacing any previous one
    async fn put(&self, key: &CacheKey, data: Bytes) -> CacheResult<()>;

    /// Remove an entry from the tier
    async fn remove(&self, key: &CacheKey) -> CacheResult<()>;

    /// Remove every entry of one variant class
    async fn clear(&self, class: VariantClass) -> CacheResult<()>;
}
