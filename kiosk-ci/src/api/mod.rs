//! HTTP API handlers for kiosk-ci

pub mod health;
pub mod ingest;

pub use health::health_routes;
pub use ingest::ingest_routes;
