//! Tag Playback (kiosk-tp) - Main entry point
//!
//! Reads NFC tag scans from the serial reader and plays the mapped video in
//! an external player, one at a time.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kiosk_common::config::ConfigResolver;
use kiosk_tp::serial::SerialPortOpener;
use kiosk_tp::{run_pipeline, PlaybackSupervisor, PlayerCommand, TagVideoMapping};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for kiosk-tp
#[derive(Parser, Debug)]
#[command(name = "kiosk-tp")]
#[command(about = "NFC tag triggered video playback for the kiosk device")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "KIOSK_CONFIG")]
    config: Option<PathBuf>,

    /// Serial device of the NFC reader
    #[arg(short, long, env = "KIOSK_SERIAL_PORT")]
    serial_port: Option<String>,

    /// Tag to video mapping file
    #[arg(short, long, env = "KIOSK_TAG_MAP")]
    mapping: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let resolver = ConfigResolver::new(args.config.clone());
    let mut config = resolver.resolve().context("Failed to load configuration")?;
    if let Some(port) = args.serial_port {
        config.playback.serial_port = port;
    }
    if let Some(mapping) = args.mapping {
        config.playback.mapping_path = mapping;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("kiosk_tp={0},kiosk_common={0}", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting kiosk Tag Playback (kiosk-tp) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match resolver.locate() {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => info!("Configuration: compiled defaults"),
    }

    let playback = &config.playback;
    let mapping = TagVideoMapping::load(&playback.mapping_path)
        .with_context(|| format!("Failed to load tag mapping {}", playback.mapping_path.display()))?;
    info!("Loaded {} tag mappings from {}", mapping.len(), playback.mapping_path.display());

    let supervisor = PlaybackSupervisor::new(Arc::new(mapping), PlayerCommand::from_config(playback));
    let opener = SerialPortOpener::new(&playback.serial_port, playback.baud_rate);
    let cancel = CancellationToken::new();

    let pipeline_config = playback.clone();
    let pipeline_cancel = cancel.clone();
    let mut pipeline = tokio::spawn(async move {
        run_pipeline(opener, supervisor, &pipeline_config, pipeline_cancel).await
    });

    let joined = tokio::select! {
        joined = &mut pipeline => joined,
        _ = shutdown_signal() => {
            cancel.cancel();
            pipeline.await
        }
    };

    match joined.context("Tag pipeline panicked")? {
        Ok(()) => {
            info!("Shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Tag pipeline stopped");
            Err(anyhow::Error::new(e).context("Serial link lost"))
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
