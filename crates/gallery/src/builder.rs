//! # Builder for GalleryConfig
//!
//! Fluent construction of a [`GalleryConfig`] on top of its defaults.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use gallery_engine::{GalleryConfig, RetryPolicy};
//! use url::Url;
//!
//! let config = GalleryConfig::builder(
//!     Url::parse("https://example.com/links.txt").unwrap(),
//!     "/tmp/gallery-cache",
//! )
//! .with_user_agent("MyGallery/1.0")
//! .with_download_timeout(Duration::from_secs(45))
//! .with_retry_policy(RetryPolicy::new(4, Duration::from_millis(500)))
//! .with_disk_limits(Some(5 * 1024 * 1024), None)
//! .build();
//!
//! assert_eq!(config.retry.max_retries, 4);
//! assert_eq!(config.disk_cache.original_size_limit, None);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::classifier::{ClassifierRules, ThumbnailProvider};
use crate::config::{GalleryConfig, HttpConfig};
use crate::net::retry::RetryPolicy;

/// Builder for creating GalleryConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct GalleryConfigBuilder {
    config: GalleryConfig,
}

impl GalleryConfigBuilder {
    pub fn new(manifest_url: Url, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: GalleryConfig::new(manifest_url, cache_dir),
        }
    }

    pub fn with_http_config(mut self, http: HttpConfig) -> Self {
        self.config.http = http;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.http.user_agent = user_agent.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.request_timeout = timeout;
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.http.follow_redirects = follow;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.config.download_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    pub fn with_probe_bytes(mut self, bytes: u64) -> Self {
        self.config.probe_bytes = bytes.max(1);
        self
    }

    /// Replace the accepted manifest content type prefixes
    pub fn with_accepted_content_types<I, S>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.accepted_content_types = content_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn with_reachability_interval(mut self, interval: Duration) -> Self {
        self.config.reachability_interval = interval;
        self
    }

    /// Memory tier cost limits in bytes, `None` meaning unbounded
    pub fn with_memory_limits(mut self, thumbnails: Option<u64>, originals: Option<u64>) -> Self {
        self.config.memory_cache.thumbnail_cost_limit = thumbnails;
        self.config.memory_cache.original_cost_limit = originals;
        self
    }

    /// Disk namespace size limits in bytes, `None` meaning unbounded
    pub fn with_disk_limits(mut self, thumbnails: Option<u64>, originals: Option<u64>) -> Self {
        self.config.disk_cache.thumbnail_size_limit = thumbnails;
        self.config.disk_cache.original_size_limit = originals;
        self
    }

    pub fn with_classifier_rules(mut self, rules: ClassifierRules) -> Self {
        self.config.classifier = rules;
        self
    }

    /// Add one entry to the thumbnail CDN allow-list
    pub fn with_thumbnail_provider(
        mut self,
        host_marker: impl Into<String>,
        thumbnail_marker: impl Into<String>,
    ) -> Self {
        self.config
            .classifier
            .thumbnail_providers
            .push(ThumbnailProvider::new(host_marker, thumbnail_marker));
        self
    }

    pub fn with_thumbnail_quality(mut self, quality: u8) -> Self {
        self.config.thumbnail_quality = quality.clamp(1, 100);
        self
    }

    pub fn build(self) -> GalleryConfig {
        self.config
    }
}
