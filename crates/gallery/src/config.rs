use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::types::{DiskCacheConfig, MemoryCacheConfig};
use crate::classifier::ClassifierRules;
use crate::net::gateway::DEFAULT_MANIFEST_CONTENT_TYPES;
use crate::net::probe::PROBE_RANGE_BYTES;
use crate::net::retry::RetryPolicy;

const DEFAULT_USER_AGENT: &str = concat!("gallery-engine/", env!("CARGO_PKG_VERSION"));

/// Settings for the underlying HTTP client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User agent string
    pub user_agent: String,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Default timeout for a whole request, zero disables it
    pub request_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            follow_redirects: true,
        }
    }
}

/// Everything needed to assemble a [`crate::GalleryRepository`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// Endpoint serving the link manifest
    pub manifest_url: Url,

    /// Root of the on-disk cache (`links/`, `thumbnails/`, `originals/`)
    pub cache_dir: PathBuf,

    #[serde(default)]
    pub http: HttpConfig,

    /// Timeout for a full image download
    #[serde(default = "default_download_timeout")]
    pub download_timeout: Duration,

    /// Timeout for a metadata probe
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: Duration,

    /// Bytes requested when probing image metadata
    #[serde(default = "default_probe_bytes")]
    pub probe_bytes: u64,

    /// Content type prefixes a manifest response may declare
    #[serde(default = "default_content_types")]
    pub accepted_content_types: Vec<String>,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// How often connectivity is probed while a caller waits for it
    #[serde(default = "default_reachability_interval")]
    pub reachability_interval: Duration,

    #[serde(default)]
    pub memory_cache: MemoryCacheConfig,

    #[serde(default)]
    pub disk_cache: DiskCacheConfig,

    #[serde(default)]
    pub classifier: ClassifierRules,

    /// JPEG quality used for opaque thumbnails
    #[serde(default = "default_thumbnail_quality")]
    pub thumbnail_quality: u8,
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_probe_bytes() -> u64 {
    PROBE_RANGE_BYTES
}

fn default_content_types() -> Vec<String> {
    DEFAULT_MANIFEST_CONTENT_TYPES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_reachability_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_thumbnail_quality() -> u8 {
    85
}

impl GalleryConfig {
    pub fn new(manifest_url: Url, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest_url,
            cache_dir: cache_dir.into(),
            http: HttpConfig::default(),
            download_timeout: default_download_timeout(),
            probe_timeout: default_probe_timeout(),
            probe_bytes: default_probe_bytes(),
            accepted_content_types: default_content_types(),
            retry: RetryPolicy::default(),
            reachability_interval: default_reachability_interval(),
            memory_cache: MemoryCacheConfig::default(),
            disk_cache: DiskCacheConfig::default(),
            classifier: ClassifierRules::default(),
            thumbnail_quality: default_thumbnail_quality(),
        }
    }

    pub fn builder(
        manifest_url: Url,
        cache_dir: impl Into<PathBuf>,
    ) -> crate::builder::GalleryConfigBuilder {
        crate::builder::GalleryConfigBuilder::new(manifest_url, cache_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = GalleryConfig::new(
            Url::parse("https://example.com/links.txt").unwrap(),
            "/tmp/gallery",
        );
        assert_eq!(config.download_timeout, Duration::from_secs(30));
        assert_eq!(config.probe_bytes, 2048);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.base_delay, Duration::from_secs(1));
        assert_eq!(config.memory_cache.thumbnail_cost_limit, Some(10 * 1024 * 1024));
        assert_eq!(config.memory_cache.original_cost_limit, Some(80 * 1024 * 1024));
        assert_eq!(config.disk_cache.thumbnail_size_limit, Some(20 * 1024 * 1024));
        assert_eq!(config.disk_cache.original_size_limit, Some(200 * 1024 * 1024));
        assert!(
            config
                .accepted_content_types
                .iter()
                .any(|t| t == "application/octet-stream")
        );
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{"manifest_url":"https://example.com/links.txt","cache_dir":"/tmp/g"}"#;
        let config: GalleryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config,
            GalleryConfig::new(Url::parse("https://example.com/links.txt").unwrap(), "/tmp/g")
        );
    }
}
