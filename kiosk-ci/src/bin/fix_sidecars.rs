//! kiosk-fix-sidecars - point stored sidecars at their local media files
//!
//! Walks the content tree and rewrites each sidecar's `mediaUrl` to the path
//! of the media file stored next to it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kiosk_ci::services::sidecar_fixer;
use kiosk_common::config::ConfigResolver;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kiosk-fix-sidecars")]
#[command(about = "Rewrite sidecar mediaUrl fields to local media paths")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "KIOSK_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder of the content tree
    #[arg(short, long, env = "KIOSK_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = ConfigResolver::new(args.config)
        .resolve()
        .context("Failed to load configuration")?;
    let root = args.storage_root.unwrap_or(config.storage_root);

    let report = sidecar_fixer::fix_sidecars(&root, &config.ingest.media_extension)
        .with_context(|| format!("Error traversing content directory {}", root.display()))?;

    info!(
        "Sidecar correction finished: {} updated, {} failed",
        report.updated, report.failed
    );
    if report.failed > 0 {
        anyhow::bail!("{} sidecar(s) could not be updated", report.failed);
    }
    Ok(())
}
