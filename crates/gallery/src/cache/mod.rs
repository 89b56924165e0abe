//! # Cache Module
//!
//! Two-tier content cache (memory and disk) plus the persisted manifest.

pub mod manifest;
pub mod providers;
pub mod store;
pub mod tiered;
pub mod types;

pub use manifest::ManifestStore;
pub use providers::{CacheTier, DiskTier, MemoryTier};
pub use store::DiskStore;
pub use tiered::TieredCache;
pub use types::{
    CacheKey, CacheResult, CacheVariant, DiskCacheConfig, MemoryCacheConfig, Namespace,
    VariantClass,
};
