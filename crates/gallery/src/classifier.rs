//! # Link Classifier
//!
//! Turns raw manifest bytes into an ordered, deduplicated list of [`LinkRecord`]s.
//! Classification is pure: the same bytes and rules always yield the same records.

use std::collections::HashSet;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GalleryError, Result};
use crate::models::{ContentKind, LinkRecord};

/// Characters outside the union of the host, path, query and fragment sets.
/// Non-ASCII input is always encoded.
const OUTSIDE_URL_CHARS: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// A CDN that serves thumbnails without a recognisable file extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailProvider {
    /// Substring the host must contain
    pub host_marker: String,
    /// Substring the path or query must contain
    pub thumbnail_marker: String,
}

impl ThumbnailProvider {
    pub fn new(host_marker: impl Into<String>, thumbnail_marker: impl Into<String>) -> Self {
        Self {
            host_marker: host_marker.into(),
            thumbnail_marker: thumbnail_marker.into(),
        }
    }

    fn matches(&self, host: &str, path: &str, query: &str) -> bool {
        host.contains(&self.host_marker)
            && (path.contains(&self.thumbnail_marker) || query.contains(&self.thumbnail_marker))
    }
}

/// Allow-lists deciding which URLs count as images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierRules {
    /// Lowercase extensions without the leading dot
    pub image_extensions: Vec<String>,
    pub thumbnail_providers: Vec<ThumbnailProvider>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            image_extensions: ["png", "jpg", "jpeg", "gif", "bmp", "webp", "heic"]
                .into_iter()
                .map(String::from)
                .collect(),
            thumbnail_providers: vec![
                ThumbnailProvider::new("gstatic.com", "tbn:"),
                ThumbnailProvider::new("ytimg.com", "/vi/"),
            ],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinkClassifier {
    rules: ClassifierRules,
}

impl LinkClassifier {
    pub fn new(mut rules: ClassifierRules) -> Self {
        for ext in &mut rules.image_extensions {
            *ext = ext.trim_start_matches('.').to_ascii_lowercase();
        }
        rules.image_extensions.retain(|ext| !ext.is_empty());
        Self { rules }
    }

    pub fn rules(&self) -> &ClassifierRules {
        &self.rules
    }

    /// Classify every non-empty line of `raw`.
    ///
    /// Fails with [`GalleryError::Decoding`] when `raw` is not UTF-8.
    pub fn classify(&self, raw: &[u8]) -> Result<Vec<LinkRecord>> {
        let content = std::str::from_utf8(raw).map_err(GalleryError::Decoding)?;

        let mut seen = HashSet::new();
        let records = content
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| {
                let trimmed = line.trim();
                (!trimmed.is_empty() && seen.insert(trimmed)).then(|| self.record(idx + 1, trimmed))
            })
            .collect();

        Ok(records)
    }

    fn record(&self, line_number: usize, text: &str) -> LinkRecord {
        let (url, content_kind) = match parse_http_url(text) {
            Some(url) if self.is_image(&url) => (Some(url), ContentKind::Image),
            Some(url) => (Some(url), ContentKind::NonImageUrl),
            None => (None, ContentKind::NotUrl),
        };

        LinkRecord {
            line_number,
            original_text: text.to_string(),
            url,
            content_kind,
        }
    }

    fn is_image(&self, url: &Url) -> bool {
        let path = url.path().to_ascii_lowercase();
        let query = url.query().unwrap_or_default().to_ascii_lowercase();

        if let Some(ext) = path_extension(url) {
            let ext = ext.to_ascii_lowercase();
            if self.rules.image_extensions.iter().any(|known| *known == ext) {
                return true;
            }
        }

        if self
            .rules
            .image_extensions
            .iter()
            .any(|token| path.contains(token.as_str()) || query.contains(token.as_str()))
        {
            return true;
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        self.rules
            .thumbnail_providers
            .iter()
            .any(|provider| provider.matches(&host, &path, &query))
    }
}

/// Parse `text` as an absolute http(s) URL, retrying once with
/// characters outside the URL character set percent-encoded.
pub fn parse_http_url(text: &str) -> Option<Url> {
    let url = Url::parse(text).or_else(|_| Url::parse(&encode_outside_url_chars(text)));

    match url {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            Some(url)
        }
        _ => None,
    }
}

fn encode_outside_url_chars(text: &str) -> String {
    utf8_percent_encode(text, OUTSIDE_URL_CHARS).to_string()
}

/// Extension of the last path segment, without the dot
pub fn path_extension(url: &Url) -> Option<&str> {
    let segment = url.path_segments()?.next_back()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}
