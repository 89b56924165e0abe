use std::path::{Path, PathBuf};
use std::time::Duration;

use gallery_engine::{ClassifierRules, GalleryConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Manifest endpoint
    pub manifest_url: Option<Url>,

    /// Cache root, defaults to a directory under the system temp dir
    pub cache_dir: Option<PathBuf>,

    /// User agent string for requests
    pub user_agent: Option<String>,

    /// Connection timeout in seconds
    pub connect_timeout: u64,

    /// Full image download timeout in seconds
    pub download_timeout: u64,

    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single retry delay in milliseconds, 0 for none
    pub retry_max_delay_ms: u64,

    /// Memory tier budgets in MiB, 0 for unbounded
    pub memory_thumbnails_mb: u64,
    pub memory_originals_mb: u64,

    /// Disk namespace budgets in MiB, 0 for unbounded
    pub disk_thumbnails_mb: u64,
    pub disk_originals_mb: u64,

    /// JPEG quality for opaque thumbnails
    pub thumbnail_quality: u8,

    /// Which links count as images
    pub classifier: ClassifierRules,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            manifest_url: None,
            cache_dir: None,
            user_agent: None,
            connect_timeout: 10,
            download_timeout: 30,
            max_retries: 2,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 0,
            memory_thumbnails_mb: 10,
            memory_originals_mb: 80,
            disk_thumbnails_mb: 20,
            disk_originals_mb: 200,
            thumbnail_quality: 85,
            classifier: ClassifierRules::default(),
        }
    }
}

/// Command line values that take precedence over the file
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub manifest_url: Option<Url>,
    pub cache_dir: Option<PathBuf>,
    pub max_retries: Option<u32>,
}

fn megabytes(value: u64) -> Option<u64> {
    (value > 0).then(|| value.saturating_mul(MIB))
}

fn millis(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_millis(value))
}

impl AppConfig {
    /// Load configuration from `config_path`; a missing file means defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content).map_err(|e| {
                    AppError::Config(format!("failed to parse {}: {e}", path.display()))
                })
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn default_cache_dir() -> PathBuf {
        std::env::temp_dir().join("gallery-cache")
    }

    /// Merge with the command line and produce the engine configuration
    pub fn to_gallery_config(&self, overrides: &Overrides) -> Result<GalleryConfig> {
        let manifest_url = overrides
            .manifest_url
            .clone()
            .or_else(|| self.manifest_url.clone())
            .ok_or_else(|| {
                AppError::Config(
                    "no manifest URL, pass --manifest or set manifest_url in the config file"
                        .to_string(),
                )
            })?;
        let cache_dir = overrides
            .cache_dir
            .clone()
            .or_else(|| self.cache_dir.clone())
            .unwrap_or_else(Self::default_cache_dir);

        let retry = RetryPolicy {
            max_retries: overrides.max_retries.unwrap_or(self.max_retries),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: millis(self.retry_max_delay_ms),
        };

        let mut builder = GalleryConfig::builder(manifest_url, cache_dir)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout))
            .with_download_timeout(Duration::from_secs(self.download_timeout))
            .with_retry_policy(retry)
            .with_memory_limits(
                megabytes(self.memory_thumbnails_mb),
                megabytes(self.memory_originals_mb),
            )
            .with_disk_limits(
                megabytes(self.disk_thumbnails_mb),
                megabytes(self.disk_originals_mb),
            )
            .with_classifier_rules(self.classifier.clone())
            .with_thumbnail_quality(self.thumbnail_quality);

        if let Some(user_agent) = &self.user_agent {
            builder = builder.with_user_agent(user_agent.clone());
        }

        Ok(builder.build())
    }
}
