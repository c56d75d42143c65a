//! Business logic services for kiosk-ci

pub mod content_fetcher;
pub mod ingestion;
pub mod registration;
pub mod sidecar_fixer;

pub use content_fetcher::{ContentFetcher, FetchError};
pub use ingestion::{IngestError, IngestionOrchestrator, IngestionResult};
pub use registration::{DeviceStatus, RegistrationClient, RegistrationError};
