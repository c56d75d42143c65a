//! Content ingestion endpoint
//!
//! `POST /receive-content` is the only mutating entry point of the device.
//! It answers 200 for both `success` and `partial_success` so the control
//! plane does not retry items that were already stored.

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use kiosk_common::IngestionRequest;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::services::IngestionResult;
use crate::AppState;

/// POST /receive-content
pub async fn receive_content(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<IngestionResult>> {
    let request: IngestionRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Error decoding ingestion request");
        ApiError::BadRequest("Invalid request body".to_string())
    })?;

    info!(
        deployment_id = %request.deployment_id,
        project_id = %request.project_id,
        items = request.things.len(),
        "Received ingestion request"
    );

    let result = state.orchestrator.handle(&request).await?;
    Ok(Json(result))
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Build ingestion routes
pub fn ingest_routes() -> Router<AppState> {
    Router::new().route(
        "/receive-content",
        post(receive_content).fallback(method_not_allowed),
    )
}
