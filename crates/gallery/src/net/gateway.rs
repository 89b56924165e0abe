//! # Network Gateway
//!
//! Every remote operation the gallery performs: manifest fetch, metadata
//! probing and full image download. Each runs under the shared [`Retrier`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::classifier::LinkClassifier;
use crate::config::GalleryConfig;
use crate::error::{GalleryError, Result};
use crate::models::{ImageMetadata, ManifestSnapshot};
use crate::net::probe::{PROBE_RANGE_BYTES, detect_format};
use crate::net::retry::Retrier;
use crate::net::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Content types a manifest response may declare
pub const DEFAULT_MANIFEST_CONTENT_TYPES: &[&str] =
    &["text/plain", "text/", "application/octet-stream"];

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub manifest_url: Url,
    pub accepted_content_types: Vec<String>,
    pub download_timeout: Duration,
    pub probe_timeout: Duration,
    pub probe_bytes: u64,
}

impl GatewaySettings {
    pub fn new(manifest_url: Url) -> Self {
        Self {
            manifest_url,
            accepted_content_types: DEFAULT_MANIFEST_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            download_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(15),
            probe_bytes: PROBE_RANGE_BYTES,
        }
    }
}

impl From<&GalleryConfig> for GatewaySettings {
    fn from(config: &GalleryConfig) -> Self {
        Self {
            manifest_url: config.manifest_url.clone(),
            accepted_content_types: config.accepted_content_types.clone(),
            download_timeout: config.download_timeout,
            probe_timeout: config.probe_timeout,
            probe_bytes: config.probe_bytes,
        }
    }
}

pub struct NetworkGateway {
    transport: Arc<dyn HttpTransport>,
    retrier: Retrier,
    classifier: LinkClassifier,
    settings: GatewaySettings,
}

impl NetworkGateway {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        retrier: Retrier,
        classifier: LinkClassifier,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            transport,
            retrier,
            classifier,
            settings,
        }
    }

    pub fn manifest_url(&self) -> &Url {
        &self.settings.manifest_url
    }

    pub fn retrier(&self) -> &Retrier {
        &self.retrier
    }

    /// Fetch and classify the manifest.
    ///
    /// A wrong content type or undecodable body fails at once without retrying.
    pub async fn fetch_manifest(&self, cancel: &CancellationToken) -> Result<ManifestSnapshot> {
        let url = &self.settings.manifest_url;

        let records = self
            .retrier
            .run("fetch_manifest", cancel, |attempt| async move {
                debug!(url = %url, attempt, "Fetching manifest");
                let response = self
                    .perform(HttpRequest::get(url.clone()), cancel)
                    .await?
                    .error_for_status(url)?;
                self.validate_content_type(&response)?;
                self.classifier.classify(&response.body)
            })
            .await?;

        info!(url = %url, records = records.len(), "Fetched manifest");

        Ok(ManifestSnapshot {
            source_url: url.clone(),
            fetched_at: Utc::now(),
            records,
        })
    }

    /// Read the head of `url` and work out its image format.
    ///
    /// An unrecognisable resource yields [`crate::ImageFormat::Unknown`], not an error.
    pub async fn probe_metadata(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<ImageMetadata> {
        let last_byte = self.settings.probe_bytes.saturating_sub(1);

        let response = self
            .retrier
            .run("probe_metadata", cancel, |_| async move {
                let request = HttpRequest::get(url.clone())
                    .with_range(0..=last_byte)
                    .with_timeout(self.settings.probe_timeout);
                self.perform(request, cancel).await?.error_for_status(url)
            })
            .await?;

        let mime_type = response.content_type().map(str::to_string);
        let head_len = response.body.len().min(self.settings.probe_bytes as usize);
        let format = detect_format(mime_type.as_deref(), url, &response.body[..head_len]);
        debug!(url = %url, format = ?format, mime = ?mime_type, "Probed image metadata");

        Ok(ImageMetadata {
            format,
            mime_type,
            original_url: url.clone(),
        })
    }

    /// Download the full body of `url`
    pub async fn download(&self, url: &Url, cancel: &CancellationToken) -> Result<Bytes> {
        let response = self
            .retrier
            .run("download", cancel, |_| async move {
                let request =
                    HttpRequest::get(url.clone()).with_timeout(self.settings.download_timeout);
                self.perform(request, cancel).await?.error_for_status(url)
            })
            .await?;

        debug!(url = %url, bytes = response.body.len(), "Downloaded image");
        Ok(response.body)
    }

    async fn perform(&self, request: HttpRequest, cancel: &CancellationToken) -> Result<HttpResponse> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GalleryError::Cancelled),
            response = self.transport.perform(request) => response,
        }
    }

    fn validate_content_type(&self, response: &HttpResponse) -> Result<()> {
        let declared = response.content_type();
        let accepted = declared.is_some_and(|content_type| {
            let content_type = content_type.to_ascii_lowercase();
            self.settings
                .accepted_content_types
                .iter()
                .any(|prefix| content_type.starts_with(&prefix.to_ascii_lowercase()))
        });

        if accepted {
            Ok(())
        } else {
            Err(GalleryError::InvalidContentType {
                expected: self.settings.accepted_content_types.clone(),
                actual: declared.map(str::to_string),
            })
        }
    }
}
