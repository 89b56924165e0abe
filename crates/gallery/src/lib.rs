//! # Gallery Engine
//!
//! Data acquisition and caching for a manifest-driven image gallery.
//!
//! A remote text manifest is fetched and classified line by line into image
//! links, non-image links and invalid text. Image bytes are served through a
//! memory tier, a size-bounded disk tier and finally the network, with
//! thumbnails derived locally from the cached original. Network operations
//! retry with exponential backoff and, while offline, wait for connectivity
//! instead of spending their retry budget.

pub mod builder;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod models;
pub mod net;
pub mod render;
pub mod repository;

#[cfg(test)]
mod testing;

pub use builder::GalleryConfigBuilder;
pub use cache::{CacheKey, CacheVariant, DiskCacheConfig, MemoryCacheConfig, VariantClass};
pub use classifier::{ClassifierRules, LinkClassifier, ThumbnailProvider};
pub use config::{GalleryConfig, HttpConfig};
pub use error::{GalleryError, Result};
pub use models::{
    ContentKind, GalleryImage, GalleryItem, GalleryPlaceholder, GallerySnapshot, ImageFormat,
    ImageMetadata, LinkRecord, ManifestSnapshot, PlaceholderReason,
};
pub use net::{ReachabilityMonitor, ReachabilityStatus, RetryPolicy};
pub use render::{ImageRenderer, RenderError, ThumbnailRenderer};
pub use repository::GalleryRepository;

// Re-export for callers that pass cancellation tokens
pub use tokio_util::sync::CancellationToken;
