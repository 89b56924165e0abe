//! # Thumbnail Rendering
//!
//! The rendering seam used by the repository and an implementation on top of
//! the `image` crate.

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("image data is empty")]
    EmptyInput,

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode thumbnail: {0}")]
    Encode(String),

    #[error("render task failed: {0}")]
    Task(String),
}

/// Produces a thumbnail no larger than `max_pixel_size` on its longer edge
#[async_trait]
pub trait ThumbnailRenderer: Send + Sync {
    async fn render_thumbnail(&self, data: Bytes, max_pixel_size: u32) -> Result<Bytes, RenderError>;
}

/// Renders with the `image` crate on the blocking thread pool.
///
/// Never upscales. Sources with an alpha channel are encoded as PNG,
/// everything else as JPEG.
#[derive(Debug, Clone, Copy)]
pub struct ImageRenderer {
    jpeg_quality: u8,
}

impl ImageRenderer {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }
}

impl Default for ImageRenderer {
    fn default() -> Self {
        Self::new(85)
    }
}

#[async_trait]
impl ThumbnailRenderer for ImageRenderer {
    async fn render_thumbnail(&self, data: Bytes, max_pixel_size: u32) -> Result<Bytes, RenderError> {
        if data.is_empty() {
            return Err(RenderError::EmptyInput);
        }

        let quality = self.jpeg_quality;
        tokio::task::spawn_blocking(move || render_blocking(&data, max_pixel_size, quality))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))?
    }
}

fn render_blocking(data: &[u8], max_pixel_size: u32, quality: u8) -> Result<Bytes, RenderError> {
    let bound = max_pixel_size.max(1);
    let source = image::load_from_memory(data).map_err(|e| RenderError::Decode(e.to_string()))?;
    let (width, height) = (source.width(), source.height());

    let image = if width.max(height) > bound {
        source.thumbnail(bound, bound)
    } else {
        source
    };

    let encoded = if image.color().has_alpha() {
        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        out.into_inner()
    } else {
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, quality);
        DynamicImage::ImageRgb8(image.to_rgb8())
            .write_with_encoder(encoder)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        out
    };

    debug!(
        source_width = width,
        source_height = height,
        width = image.width(),
        height = image.height(),
        bytes = encoded.len(),
        "Rendered thumbnail"
    );
    Ok(Bytes::from(encoded))
}
