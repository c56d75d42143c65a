//! Shared test helpers: throwaway HTTP servers bound to 127.0.0.1:0

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use kiosk_ci::services::{ContentFetcher, IngestionOrchestrator};
use kiosk_ci::{build_router, AppState};
use futures::stream::{self, StreamExt};
use std::convert::Infallible;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Media bytes served at `/v.mp4`
pub const VIDEO_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42 fake video payload \xff\xfe";

/// Media bytes served at `/other.mp4`
pub const OTHER_BYTES: &[u8] = b"a different video";

/// Start `router` on an ephemeral port, returning its base URL
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Media origin: `/v.mp4`, `/other.mp4`, `/big.mp4`, `/missing.mp4` (404), `/broken.mp4` (500)
pub async fn spawn_media_server() -> String {
    let router = Router::new()
        .route("/v.mp4", get(|| async { VIDEO_BYTES }))
        .route("/other.mp4", get(|| async { OTHER_BYTES }))
        .route("/big.mp4", get(|| async { vec![7u8; 256 * 1024] }))
        .route("/missing.mp4", get(|| async { StatusCode::NOT_FOUND }))
        .route("/broken.mp4", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    serve(router).await
}

/// Body of `len` copies of `byte`, sent in small chunks with a pause between them
fn trickle(byte: u8, len: usize) -> Body {
    let chunks = stream::iter(0..len / 1024).then(move |_| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, Infallible>(vec![byte; 1024])
    });
    Body::from_stream(chunks)
}

/// Slow origin: `/slow-a.mp4` and `/slow-b.mp4` each trickle 20 KiB of `a` / `b`
pub async fn spawn_slow_media_server() -> String {
    let router = Router::new()
        .route("/slow-a.mp4", get(|| async { trickle(b'a', 20 * 1024) }))
        .route("/slow-b.mp4", get(|| async { trickle(b'b', 20 * 1024) }));
    serve(router).await
}

/// In-flight request gauge for `/counted.mp4`
#[derive(Default)]
pub struct Gauge {
    current: AtomicUsize,
    pub peak: AtomicUsize,
}

/// Origin whose `/counted.mp4` records the peak number of concurrent requests
pub async fn spawn_counting_media_server() -> (String, Arc<Gauge>) {
    let gauge = Arc::new(Gauge::default());
    let state = gauge.clone();
    let router = Router::new().route(
        "/counted.mp4",
        get(move || {
            let gauge = state.clone();
            async move {
                let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
                gauge.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                gauge.current.fetch_sub(1, Ordering::SeqCst);
                VIDEO_BYTES
            }
        }),
    );
    (serve(router).await, gauge)
}

/// Staging files left in `dir`
pub fn staging_leftovers(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".part"))
        .collect()
}

/// Ingestion app storing under `storage_root`
pub fn ingest_app(storage_root: &Path) -> Router {
    let fetcher = ContentFetcher::new("mp4", None).unwrap();
    let orchestrator = IngestionOrchestrator::new(storage_root.to_path_buf(), fetcher, 4);
    build_router(AppState::new(orchestrator))
}

pub fn json_request(method: &str, uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(body: Body) -> Vec<u8> {
    body.collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(body: Body) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(body).await).expect("Should parse JSON")
}
