//! Liveness endpoint used by the control plane and the device watchdog

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub storage_root: String,
    /// False when the content tree is missing or not a directory
    pub storage_ready: bool,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let root = state.orchestrator.storage_root();
    let storage_ready = tokio::fs::metadata(root)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    Json(HealthResponse {
        status: if storage_ready { "ok" } else { "degraded" },
        module: "kiosk-ci",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        storage_root: root.display().to_string(),
        storage_ready,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
