mod cli;
mod commands;
mod config;
mod error;

use std::process;

use clap::Parser;
use gallery_engine::{CancellationToken, GalleryRepository};
use tracing::{Level, debug, error, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands},
    commands::{ClearTarget, CommandExecutor},
    config::{AppConfig, Overrides},
    error::Result,
};

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let config = AppConfig::load(args.config.as_deref())?;
    debug!(?config, "Loaded configuration");

    let gallery_config = config.to_gallery_config(&Overrides {
        manifest_url: args.manifest.clone(),
        cache_dir: args.cache_dir.clone(),
        max_retries: args.retries,
    })?;

    let repository = GalleryRepository::from_config(&gallery_config).await?;

    // Ctrl+C cancels whatever is in flight
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    let executor = CommandExecutor::new(repository, cancel);

    match args.command {
        Commands::Load(list) => executor.load(list).await?,
        Commands::Refresh(list) => executor.refresh(list).await?,
        Commands::Fetch {
            url,
            thumbnail,
            output,
        } => executor.fetch(&url, thumbnail, output.as_deref()).await?,
        Commands::Probe { url } => executor.probe(&url).await?,
        Commands::Clear {
            thumbnails,
            originals,
            all,
        } => {
            executor
                .clear(ClearTarget::from_flags(thumbnails, originals, all)?)
                .await?
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_level(verbose))
        .with(filter)
        .init();
}
