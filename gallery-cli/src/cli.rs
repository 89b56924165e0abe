use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "gallery",
    about = "Fetch a link manifest and serve its images through a local cache",
    version,
    author
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Manifest URL, overrides the configuration file
    #[arg(short, long, global = true, env = "GALLERY_MANIFEST_URL")]
    pub manifest: Option<Url>,

    /// Cache root directory, overrides the configuration file
    #[arg(long, global = true, env = "GALLERY_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Number of retries after the first attempt
    #[arg(long, global = true)]
    pub retries: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the gallery, from cache when available
    Load(ListArgs),

    /// Re-fetch the manifest from the network and show the gallery
    Refresh(ListArgs),

    /// Fetch the bytes of one image through the cache
    Fetch {
        /// Image URL
        url: Url,

        /// Render a thumbnail bounded to this many pixels instead of the original
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        thumbnail: Option<u32>,

        /// Write the bytes to this file instead of reporting their size
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Probe the format of one image without downloading it
    Probe {
        /// Image URL
        url: Url,
    },

    /// Clear cached data
    Clear {
        /// Clear cached thumbnails
        #[arg(long)]
        thumbnails: bool,

        /// Clear cached originals
        #[arg(long)]
        originals: bool,

        /// Clear thumbnails, originals and the persisted manifest
        #[arg(long, conflicts_with_all = ["thumbnails", "originals"])]
        all: bool,
    },
}

#[derive(ClapArgs, Debug, Clone, Copy)]
pub struct ListArgs {
    /// Print the gallery as JSON
    #[arg(long)]
    pub json: bool,

    /// Only list image items
    #[arg(long)]
    pub images_only: bool,
}
