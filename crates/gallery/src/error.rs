use std::path::PathBuf;

use reqwest::StatusCode;
use url::Url;

/// Error type for every gallery operation
#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Server returned status code {status} for {url}")]
    StatusCode { url: Url, status: StatusCode },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid content type {actual:?}, expected one of {expected:?}")]
    InvalidContentType {
        expected: Vec<String>,
        actual: Option<String>,
    },

    #[error("Manifest is not valid UTF-8: {0}")]
    Decoding(#[from] std::str::Utf8Error),

    #[error("Failed to create cache directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image data unavailable for {url}")]
    ImageDataUnavailable {
        url: Url,
        #[source]
        source: Option<Box<GalleryError>>,
    },

    #[error("Thumbnail rendering failed: {0}")]
    Render(#[from] crate::render::RenderError),

    #[error("Reachability monitor error: {0}")]
    Reachability(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl GalleryError {
    /// Whether the failure is a transient network fault worth another attempt.
    ///
    /// Content contract violations, resource faults and cancellation are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            GalleryError::HttpError(e) => {
                e.is_connect() || e.is_timeout() || e.is_request() || e.is_body()
            }
            GalleryError::StatusCode { .. } | GalleryError::Network(_) => true,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GalleryError::Cancelled)
    }

    /// Wrap a failed download or render for `url`, leaving cancellation untouched.
    pub(crate) fn image_unavailable(url: &Url, source: GalleryError) -> Self {
        if source.is_cancelled() {
            return source;
        }
        GalleryError::ImageDataUnavailable {
            url: url.clone(),
            source: Some(Box::new(source)),
        }
    }
}

pub type Result<T, E = GalleryError> = std::result::Result<T, E>;
