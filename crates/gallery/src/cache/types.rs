//! # Cache Types
//!
//! Keys, variants and size limits shared by both cache tiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::classifier::path_extension;

/// Result type for cache tier operations
pub type CacheResult<T> = std::io::Result<T>;

const MIB: u64 = 1024 * 1024;

/// A disk sub-directory under the cache root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// The persisted manifest
    Links,
    Thumbnails,
    Originals,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Links, Namespace::Thumbnails, Namespace::Originals];

    pub fn dir_name(self) -> &'static str {
        match self {
            Namespace::Links => "links",
            Namespace::Thumbnails => "thumbnails",
            Namespace::Originals => "originals",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// The content class of a variant, each with its own budget and namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantClass {
    Thumbnail,
    Original,
}

impl VariantClass {
    pub const ALL: [VariantClass; 2] = [VariantClass::Thumbnail, VariantClass::Original];

    pub fn namespace(self) -> Namespace {
        match self {
            VariantClass::Thumbnail => Namespace::Thumbnails,
            VariantClass::Original => Namespace::Originals,
        }
    }
}

/// Which derived form of a source image is wanted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheVariant {
    /// Bounded to `max_pixel_size` on the longer edge
    Thumbnail { max_pixel_size: u32 },
    Original,
}

impl CacheVariant {
    pub fn thumbnail(max_pixel_size: u32) -> Self {
        CacheVariant::Thumbnail { max_pixel_size }
    }

    pub fn class(self) -> VariantClass {
        match self {
            CacheVariant::Thumbnail { .. } => VariantClass::Thumbnail,
            CacheVariant::Original => VariantClass::Original,
        }
    }

    pub fn namespace(self) -> Namespace {
        self.class().namespace()
    }
}

/// Identifies one cached variant of one source URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub url: Url,
    pub variant: CacheVariant,
}

impl CacheKey {
    pub fn new(url: Url, variant: CacheVariant) -> Self {
        Self { url, variant }
    }

    pub fn original(url: Url) -> Self {
        Self::new(url, CacheVariant::Original)
    }

    pub fn thumbnail(url: Url, max_pixel_size: u32) -> Self {
        Self::new(url, CacheVariant::thumbnail(max_pixel_size))
    }

    pub fn class(&self) -> VariantClass {
        self.variant.class()
    }

    /// SHA-256 of the URL (plus the thumbnail bound), hex encoded, followed
    /// by the source extension when it is filename safe.
    pub fn to_filename(&self) -> String {
        let mut hasher = Sha256::new();
        match self.variant {
            CacheVariant::Original => hasher.update(self.url.as_str()),
            CacheVariant::Thumbnail { max_pixel_size } => {
                hasher.update(format!("{}#thumbnail@{max_pixel_size}", self.url))
            }
        }
        let hash = hex::encode(hasher.finalize());

        match path_extension(&self.url).filter(|ext| is_safe_extension(ext)) {
            Some(ext) => format!("{hash}.{}", ext.to_ascii_lowercase()),
            None => hash,
        }
    }
}

fn is_safe_extension(ext: &str) -> bool {
    ext.len() <= 10 && ext.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Cost ceilings of the memory tier, `None` meaning unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryCacheConfig {
    pub thumbnail_cost_limit: Option<u64>,
    pub original_cost_limit: Option<u64>,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            thumbnail_cost_limit: Some(10 * MIB),
            original_cost_limit: Some(80 * MIB),
        }
    }
}

impl MemoryCacheConfig {
    pub fn limit_for(&self, class: VariantClass) -> Option<u64> {
        match class {
            VariantClass::Thumbnail => self.thumbnail_cost_limit,
            VariantClass::Original => self.original_cost_limit,
        }
    }
}

/// Size ceilings of the disk namespaces, `None` meaning unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskCacheConfig {
    pub thumbnail_size_limit: Option<u64>,
    pub original_size_limit: Option<u64>,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            thumbnail_size_limit: Some(20 * MIB),
            original_size_limit: Some(200 * MIB),
        }
    }
}

impl DiskCacheConfig {
    pub fn limit_for(&self, class: VariantClass) -> Option<u64> {
        match class {
            VariantClass::Thumbnail => self.thumbnail_size_limit,
            VariantClass::Original => self.original_size_limit,
        }
    }
}
