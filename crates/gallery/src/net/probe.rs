//! Image format detection for metadata probing.
//!
//! Precedence: declared MIME type, then URL path extension, then magic bytes.

use url::Url;

use crate::classifier::path_extension;
use crate::models::ImageFormat;

/// Bytes requested when probing a remote image
pub const PROBE_RANGE_BYTES: u64 = 2048;

pub fn detect_format(mime_type: Option<&str>, url: &Url, head: &[u8]) -> ImageFormat {
    let from_mime = mime_type.map(format_from_mime).unwrap_or(ImageFormat::Unknown);
    if from_mime.is_known() {
        return from_mime;
    }

    let from_extension = path_extension(url)
        .map(ImageFormat::from_token)
        .unwrap_or(ImageFormat::Unknown);
    if from_extension.is_known() {
        return from_extension;
    }

    format_from_signature(head)
}

fn format_from_mime(mime: &str) -> ImageFormat {
    let mime = mime.to_ascii_lowercase();
    let essence = mime.split(';').next().unwrap_or_default().trim();
    match essence.strip_prefix("image/") {
        Some(subtype) => ImageFormat::from_token(subtype.trim_start_matches("x-")),
        None => ImageFormat::Unknown,
    }
}

pub fn format_from_signature(head: &[u8]) -> ImageFormat {
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    const HEIF_BRANDS: &[&[u8; 4]] = &[b"heic", b"heix", b"hevc", b"heim", b"heis", b"mif1", b"msf1"];

    if head.starts_with(PNG) {
        ImageFormat::Png
    } else if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        ImageFormat::Jpeg
    } else if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        ImageFormat::Gif
    } else if head.len() >= 12 && head.starts_with(b"RIFF") && &head[8..12] == b"WEBP" {
        ImageFormat::Webp
    } else if head.len() >= 12
        && &head[4..8] == b"ftyp"
        && HEIF_BRANDS.iter().any(|brand| &head[8..12] == brand.as_slice())
    {
        ImageFormat::Heic
    } else if head.len() >= 14 && head.starts_with(b"BM") {
        ImageFormat::Bmp
    } else {
        ImageFormat::Unknown
    }
}
