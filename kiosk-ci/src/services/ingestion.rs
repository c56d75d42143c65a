//! Ingestion orchestrator
//!
//! Validates an ingestion request, prepares the project directory, fans the
//! items out to the [`ContentFetcher`] with bounded concurrency and
//! aggregates per-item failures into one in-band result.
//!
//! Only two conditions fail the request as a whole: an unusable project id and
//! a project directory that cannot be created. Every per-item failure is
//! reported inside a `partial_success` result instead.

use crate::services::content_fetcher::{is_safe_file_stem, ContentFetcher};
use futures::stream::{self, StreamExt};
use kiosk_common::IngestionRequest;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Outcome of one ingestion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestionResult {
    Success { message: String },
    PartialSuccess { errors: Vec<String> },
}

impl IngestionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, IngestionResult::Success { .. })
    }
}

/// Request-level failure; aborts the whole batch
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid project id: {0:?}")]
    InvalidProject(String),

    #[error("failed to create project directory {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Drives content fetches for ingestion requests
pub struct IngestionOrchestrator {
    storage_root: PathBuf,
    fetcher: ContentFetcher,
    max_concurrent_downloads: usize,
}

impl IngestionOrchestrator {
    pub fn new(storage_root: PathBuf, fetcher: ContentFetcher, max_concurrent_downloads: usize) -> Self {
        Self {
            storage_root,
            fetcher,
            max_concurrent_downloads: max_concurrent_downloads.max(1),
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn fetcher(&self) -> &ContentFetcher {
        &self.fetcher
    }

    /// Storage namespace of a project
    pub fn project_dir(&self, project_id: &str) -> PathBuf {
        self.storage_root.join(project_id)
    }

    /// Process one ingestion request
    ///
    /// Returns only after every item has finished, successfully or not.
    /// Errors are listed in the order of `request.things`.
    pub async fn handle(&self, request: &IngestionRequest) -> Result<IngestionResult, IngestError> {
        if !is_safe_file_stem(&request.project_id) {
            warn!(project_id = %request.project_id, "Rejecting request with invalid project id");
            return Err(IngestError::InvalidProject(request.project_id.clone()));
        }

        let project_dir = self.project_dir(&request.project_id);
        info!(
            deployment_id = %request.deployment_id,
            project_id = %request.project_id,
            customer_id = %request.customer_id,
            items = request.things.len(),
            dir = %project_dir.display(),
            "Processing ingestion request"
        );

        tokio::fs::create_dir_all(&project_dir)
            .await
            .map_err(|source| {
                error!(dir = %project_dir.display(), error = %source, "Failed to create project directory");
                IngestError::Storage {
                    path: project_dir.clone(),
                    source,
                }
            })?;

        // Each per-item future owns its inputs so the batch future stays `Send`
        let outcomes: Vec<Option<String>> = stream::iter(request.things.clone())
            .map(|item| {
                let fetcher = self.fetcher.clone();
                let project_dir = project_dir.clone();
                async move {
                    match fetcher.fetch(&project_dir, &item).await {
                        Ok(()) => {
                            info!(product_id = %item.product_id, "Processed content item");
                            None
                        }
                        Err(e) => {
                            error!(product_id = %item.product_id, error = %e, "Failed to process content item");
                            Some(format!("failed to process {}: {}", item.product_id, e))
                        }
                    }
                }
            })
            .buffered(self.max_concurrent_downloads)
            .collect()
            .await;

        let errors: Vec<String> = outcomes.into_iter().flatten().collect();

        if errors.is_empty() {
            info!(deployment_id = %request.deployment_id, "All content processed successfully");
            Ok(IngestionResult::Success {
                message: format!("Successfully processed deployment {}", request.deployment_id),
            })
        } else {
            warn!(
                deployment_id = %request.deployment_id,
                failed = errors.len(),
                total = request.things.len(),
                "Processing completed with errors"
            );
            Ok(IngestionResult::PartialSuccess { errors })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator(root: &Path) -> IngestionOrchestrator {
        let fetcher = ContentFetcher::with_client(reqwest::Client::new(), "mp4");
        IngestionOrchestrator::new(root.to_path_buf(), fetcher, 4)
    }

    fn request(project_id: &str) -> IngestionRequest {
        IngestionRequest {
            deployment_id: "d1".to_string(),
            project_id: project_id.to_string(),
            customer_id: "c1".to_string(),
            things: Vec::new(),
        }
    }

    #[test]
    fn test_result_wire_format() {
        let success = IngestionResult::Success {
            message: "Successfully processed deployment d1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&success).unwrap(),
            serde_json::json!({"status": "success", "message": "Successfully processed deployment d1"})
        );

        let partial = IngestionResult::PartialSuccess {
            errors: vec!["failed to process sku1: boom".to_string()],
        };
        assert_eq!(
            serde_json::to_value(&partial).unwrap(),
            serde_json::json!({"status": "partial_success", "errors": ["failed to process sku1: boom"]})
        );
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds_and_creates_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let orchestrator = orchestrator(dir.path());

        let result = orchestrator.handle(&request("p1")).await.unwrap();
        assert!(result.is_success());
        assert!(dir.path().join("p1").is_dir());
    }

    #[tokio::test]
    async fn test_empty_project_id_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let orchestrator = orchestrator(dir.path());

        let err = orchestrator.handle(&request("")).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidProject(_)));
    }

    #[tokio::test]
    async fn test_directory_failure_aborts_request() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("root");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let orchestrator = orchestrator(&blocker);

        let err = orchestrator.handle(&request("p1")).await.unwrap_err();
        assert!(matches!(err, IngestError::Storage { .. }));
    }
}
