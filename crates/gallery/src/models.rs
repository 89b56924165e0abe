//! # Gallery Models
//!
//! Value types shared by the classifier, the network gateway and the repository.
//! Every type here is immutable once produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// What a manifest line turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// An http(s) URL that looks like an image
    Image,
    /// An http(s) URL that does not look like an image
    NonImageUrl,
    /// Anything that is not an absolute http(s) URL
    NotUrl,
}

/// One classified line of the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// 1-based position of the line in the raw manifest
    pub line_number: usize,
    /// Trimmed line text
    pub original_text: String,
    /// Parsed URL, present iff the line is an absolute http(s) URL
    pub url: Option<Url>,
    pub content_kind: ContentKind,
}

/// Result of one manifest fetch, persisted verbatim as the durable manifest cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSnapshot {
    pub source_url: Url,
    pub fetched_at: DateTime<Utc>,
    pub records: Vec<LinkRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GalleryImage {
    pub url: Url,
    pub original_line: String,
    pub line_number: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderReason {
    NonImageUrl,
    InvalidContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GalleryPlaceholder {
    pub original_line: String,
    pub line_number: usize,
    pub reason: PlaceholderReason,
}

/// Display-facing projection of a [`LinkRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GalleryItem {
    Image(GalleryImage),
    Placeholder(GalleryPlaceholder),
}

impl GalleryItem {
    pub fn line_number(&self) -> usize {
        match self {
            GalleryItem::Image(image) => image.line_number,
            GalleryItem::Placeholder(placeholder) => placeholder.line_number,
        }
    }

    pub fn original_line(&self) -> &str {
        match self {
            GalleryItem::Image(image) => &image.original_line,
            GalleryItem::Placeholder(placeholder) => &placeholder.original_line,
        }
    }
}

impl From<&LinkRecord> for GalleryItem {
    fn from(record: &LinkRecord) -> Self {
        let placeholder = |reason| {
            GalleryItem::Placeholder(GalleryPlaceholder {
                original_line: record.original_text.clone(),
                line_number: record.line_number,
                reason,
            })
        };

        match (record.content_kind, &record.url) {
            (ContentKind::Image, Some(url)) => GalleryItem::Image(GalleryImage {
                url: url.clone(),
                original_line: record.original_text.clone(),
                line_number: record.line_number,
            }),
            (ContentKind::NonImageUrl, Some(_)) => placeholder(PlaceholderReason::NonImageUrl),
            _ => placeholder(PlaceholderReason::InvalidContent),
        }
    }
}

/// The repository's current state, replaced wholesale on every load or refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GallerySnapshot {
    pub source_url: Url,
    pub fetched_at: DateTime<Utc>,
    pub items: Vec<GalleryItem>,
}

impl GallerySnapshot {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// URLs of the image items, in manifest order
    pub fn image_urls(&self) -> impl Iterator<Item = &Url> {
        self.items.iter().filter_map(|item| match item {
            GalleryItem::Image(image) => Some(&image.url),
            GalleryItem::Placeholder(_) => None,
        })
    }
}

impl From<&ManifestSnapshot> for GallerySnapshot {
    fn from(manifest: &ManifestSnapshot) -> Self {
        Self {
            source_url: manifest.source_url.clone(),
            fetched_at: manifest.fetched_at,
            items: manifest.records.iter().map(GalleryItem::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Heic,
    Bmp,
    Unknown,
}

impl ImageFormat {
    /// Match a file extension or MIME subtype token, case-insensitively
    pub fn from_token(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "png" => ImageFormat::Png,
            "jpg" | "jpeg" => ImageFormat::Jpeg,
            "gif" => ImageFormat::Gif,
            "webp" => ImageFormat::Webp,
            "heic" | "heif" => ImageFormat::Heic,
            "bmp" => ImageFormat::Bmp,
            _ => ImageFormat::Unknown,
        }
    }

    pub fn is_known(self) -> bool {
        self != ImageFormat::Unknown
    }
}

/// Outcome of probing the head of a remote image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub format: ImageFormat,
    pub mime_type: Option<String>,
    pub original_url: Url,
}
