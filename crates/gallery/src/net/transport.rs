//! # HTTP Transport
//!
//! The narrow `perform(request) -> response` seam the gateway talks through,
//! and its reqwest-backed implementation.

use std::ops::RangeInclusive;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::config::HttpConfig;
use crate::error::{GalleryError, Result};

/// A single GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: Url,
    /// Inclusive byte range, sent as a `Range` header
    pub range: Option<RangeInclusive<u64>>,
    /// Per-request timeout overriding the client default
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            range: None,
            timeout: None,
        }
    }

    pub fn with_range(mut self, range: RangeInclusive<u64>) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Status, headers and the fully buffered body of a response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Fail with [`GalleryError::StatusCode`] unless the status is 2xx
    pub fn error_for_status(self, url: &Url) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(GalleryError::StatusCode {
                url: url.clone(),
                status: self.status,
            })
        }
    }
}

/// Performs one HTTP exchange.
///
/// Implementations return [`GalleryError::Cancelled`] when the exchange was
/// cancelled underneath them, so callers can tell it apart from network faults.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &HttpConfig) -> Result<Client> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5)
        .user_agent(&config.user_agent)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.request_timeout.is_zero() {
        client_builder = client_builder.timeout(config.request_timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    client_builder.build().map_err(GalleryError::from)
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        create_client(config).map(Self::new)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut request_builder = self.client.get(request.url.clone());
        if let Some(range) = &request.range {
            request_builder = request_builder.header(
                header::RANGE,
                format!("bytes={}-{}", range.start(), range.end()),
            );
        }
        if let Some(timeout) = request.timeout {
            request_builder = request_builder.timeout(timeout);
        }

        let response = request_builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!(url = %request.url, status = %status, bytes = body.len(), "HTTP exchange finished");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_success_status_is_an_error() {
        let url = Url::parse("https://example.com/a").unwrap();
        let err = HttpResponse::new(StatusCode::SERVICE_UNAVAILABLE, Bytes::new())
            .error_for_status(&url)
            .unwrap_err();
        assert!(matches!(
            err,
            GalleryError::StatusCode { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
        ));

        let ok = HttpResponse::new(StatusCode::PARTIAL_CONTENT, Bytes::from_static(b"x"))
            .error_for_status(&url);
        assert!(ok.is_ok());
    }

    #[test]
    fn request_builder_sets_range_and_timeout() {
        let url = Url::parse("https://example.com/a.png").unwrap();
        let request = HttpRequest::get(url)
            .with_range(0..=2047)
            .with_timeout(Duration::from_secs(5));
        assert_eq!(request.range, Some(0..=2047));
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn client_builds_from_default_config() {
        assert!(create_client(&HttpConfig::default()).is_ok());
    }
}
