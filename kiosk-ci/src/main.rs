//! Content Ingest (kiosk-ci) - Main entry point
//!
//! Starts the content ingestion HTTP server and, when a registry endpoint is
//! configured, registers the device with the control plane and keeps the
//! registration alive on a heartbeat timer.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use kiosk_ci::services::registration::{self, DeviceStatus, Heartbeat, PublicUrlSource, RegistrationClient};
use kiosk_ci::services::{ContentFetcher, IngestionOrchestrator};
use kiosk_ci::{build_router, AppState};
use kiosk_common::config::{ConfigResolver, DeviceConfig, TomlConfig};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for kiosk-ci
#[derive(Parser, Debug)]
#[command(name = "kiosk-ci")]
#[command(about = "Content ingestion service for the kiosk device")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "KIOSK_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "KIOSK_CI_PORT")]
    port: Option<u16>,

    /// Root folder of the content tree
    #[arg(short, long, env = "KIOSK_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,
}

/// Device registration kept alive for the lifetime of the server
struct Registration {
    client: Arc<RegistrationClient>,
    heartbeat: Heartbeat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let resolver = ConfigResolver::new(args.config.clone());
    let mut config = resolver.resolve().context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.ingest.port = port;
    }
    if let Some(storage_root) = args.storage_root {
        config.storage_root = storage_root;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("kiosk_ci={0},kiosk_common={0},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting kiosk Content Ingest (kiosk-ci) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match resolver.locate() {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => info!("Configuration: compiled defaults"),
    }

    tokio::fs::create_dir_all(&config.storage_root)
        .await
        .with_context(|| format!("Failed to create storage directory {}", config.storage_root.display()))?;
    info!("Storage root: {}", config.storage_root.display());

    let registration = start_registration(&config.device);

    let orchestrator = build_orchestrator(&config)?;
    let app = build_router(AppState::new(orchestrator));

    let ip: std::net::IpAddr = config
        .ingest
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.ingest.bind_address))?;
    let addr = SocketAddr::new(ip, config.ingest.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("kiosk-ci listening on http://{}", addr);
    info!("Ingestion endpoint: POST http://{}/receive-content", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(Registration { client, heartbeat }) = registration {
        match heartbeat.stop().await {
            Some(public_url) => {
                if let Err(e) = client.register(&public_url, DeviceStatus::Offline).await {
                    warn!(error = %e, "Failed to report offline status");
                }
            }
            None => info!("Device never registered; skipping offline report"),
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

fn build_orchestrator(config: &TomlConfig) -> Result<IngestionOrchestrator> {
    let timeout = config.ingest.download_timeout_secs.map(Duration::from_secs);
    let fetcher = ContentFetcher::new(&config.ingest.media_extension, timeout)
        .context("Failed to build HTTP client")?;
    info!(
        max_concurrent_downloads = config.ingest.max_concurrent_downloads,
        media_extension = %config.ingest.media_extension,
        "Content fetcher ready"
    );
    Ok(IngestionOrchestrator::new(
        config.storage_root.clone(),
        fetcher,
        config.ingest.max_concurrent_downloads,
    ))
}

/// Start the registration heartbeat
///
/// Returns `None` when registration is disabled. An unreachable tunnel agent
/// or registry is retried by the heartbeat; ingestion keeps running either way.
fn start_registration(device: &DeviceConfig) -> Option<Registration> {
    let endpoint = match &device.registry_endpoint {
        Some(endpoint) => endpoint,
        None => {
            info!("Device registration disabled (no registry_endpoint configured)");
            return None;
        }
    };

    let timeout = Duration::from_secs(device.registration_timeout_secs);
    let client = match RegistrationClient::new(endpoint, &device.device_id, timeout) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!(error = %e, "Failed to build registration client");
            return None;
        }
    };

    let source = match &device.public_url {
        Some(url) => PublicUrlSource::Fixed(url.clone()),
        None => PublicUrlSource::Tunnel(device.tunnel_api_url.clone()),
    };
    info!(device_id = %device.device_id, source = ?source, "Starting device registration heartbeat");

    let heartbeat = registration::spawn_heartbeat(
        client.clone(),
        source,
        Duration::from_secs(device.heartbeat_interval_secs.max(1)),
    );

    Some(Registration { client, heartbeat })
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
