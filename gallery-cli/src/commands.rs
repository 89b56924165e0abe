use std::path::Path;

use gallery_engine::{
    CacheVariant, CancellationToken, GalleryItem, GalleryRepository, GallerySnapshot,
    ImageMetadata, PlaceholderReason, VariantClass,
};
use serde_json::json;
use tracing::info;
use url::Url;

use crate::cli::ListArgs;
use crate::error::{AppError, Result};

/// Which cached data `clear` removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearTarget {
    pub thumbnails: bool,
    pub originals: bool,
    pub manifest: bool,
}

impl ClearTarget {
    pub fn from_flags(thumbnails: bool, originals: bool, all: bool) -> Result<Self> {
        if all {
            return Ok(Self {
                thumbnails: true,
                originals: true,
                manifest: true,
            });
        }
        if !thumbnails && !originals {
            return Err(AppError::InvalidInput(
                "nothing to clear, pass --thumbnails, --originals or --all".to_string(),
            ));
        }
        Ok(Self {
            thumbnails,
            originals,
            manifest: false,
        })
    }
}

pub struct CommandExecutor {
    repository: GalleryRepository,
    cancel: CancellationToken,
}

impl CommandExecutor {
    pub fn new(repository: GalleryRepository, cancel: CancellationToken) -> Self {
        Self { repository, cancel }
    }

    pub async fn load(&self, args: ListArgs) -> Result<()> {
        let snapshot = self.repository.load_initial_snapshot(&self.cancel).await?;
        println!("{}", render_snapshot(&snapshot, args)?);
        Ok(())
    }

    pub async fn refresh(&self, args: ListArgs) -> Result<()> {
        let snapshot = self.repository.refresh_snapshot(&self.cancel).await?;
        println!("{}", render_snapshot(&snapshot, args)?);
        Ok(())
    }

    pub async fn fetch(&self, url: &Url, thumbnail: Option<u32>, output: Option<&Path>) -> Result<()> {
        let variant = match thumbnail {
            Some(size) => CacheVariant::thumbnail(size),
            None => CacheVariant::Original,
        };

        let data = self
            .repository
            .image_data(url, variant, &self.cancel)
            .await?;

        match output {
            Some(path) => {
                tokio::fs::write(path, &data).await?;
                info!(path = %path.display(), bytes = data.len(), "Wrote image");
                println!("Wrote {} bytes to {}", data.len(), path.display());
            }
            None => println!("{} bytes ({:?}) for {url}", data.len(), variant),
        }
        Ok(())
    }

    pub async fn probe(&self, url: &Url) -> Result<()> {
        let metadata = self.repository.metadata(url, &self.cancel).await?;
        println!("{}", render_metadata(&metadata));
        Ok(())
    }

    pub async fn clear(&self, target: ClearTarget) -> Result<()> {
        if target.thumbnails {
            self.repository.clear_cache(VariantClass::Thumbnail).await?;
            println!("Cleared cached thumbnails");
        }
        if target.originals {
            self.repository.clear_cache(VariantClass::Original).await?;
            println!("Cleared cached originals");
        }
        if target.manifest {
            self.repository.clear_manifest().await?;
            println!("Cleared persisted manifest");
        }
        Ok(())
    }
}

fn placeholder_label(reason: PlaceholderReason) -> &'static str {
    match reason {
        PlaceholderReason::NonImageUrl => "link",
        PlaceholderReason::InvalidContent => "invalid",
    }
}

pub fn render_snapshot(snapshot: &GallerySnapshot, args: ListArgs) -> Result<String> {
    let items = snapshot
        .items
        .iter()
        .filter(|item| !args.images_only || matches!(item, GalleryItem::Image(_)));

    if args.json {
        let items: Vec<_> = items
            .map(|item| match item {
                GalleryItem::Image(image) => json!({
                    "line": image.line_number,
                    "kind": "image",
                    "url": image.url.as_str(),
                }),
                GalleryItem::Placeholder(placeholder) => json!({
                    "line": placeholder.line_number,
                    "kind": placeholder_label(placeholder.reason),
                    "text": placeholder.original_line,
                }),
            })
            .collect();
        let document = json!({
            "source": snapshot.source_url.as_str(),
            "fetched_at": snapshot.fetched_at.to_rfc3339(),
            "items": items,
        });
        return Ok(serde_json::to_string_pretty(&document)?);
    }

    let mut out = format!(
        "{} (fetched {})\n",
        snapshot.source_url,
        snapshot.fetched_at.to_rfc3339()
    );
    for item in items {
        let label = match item {
            GalleryItem::Image(_) => "image",
            GalleryItem::Placeholder(placeholder) => placeholder_label(placeholder.reason),
        };
        out.push_str(&format!(
            "{:>5}  {:<7}  {}\n",
            item.line_number(),
            label,
            item.original_line()
        ));
    }
    Ok(out.trim_end().to_string())
}

pub fn render_metadata(metadata: &ImageMetadata) -> String {
    format!(
        "{}\n  format: {:?}\n  mime:   {}",
        metadata.original_url,
        metadata.format,
        metadata.mime_type.as_deref().unwrap_or("-")
    )
}
