//! Sidecar path rewriting
//!
//! Rewrites the `mediaUrl` of every stored metadata sidecar so it points at
//! the locally stored media file instead of the remote source it was downloaded from.

use kiosk_common::ContentItem;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("failed to read JSON file: {0}")]
    Read(std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Parse(serde_json::Error),

    #[error("failed to marshal updated JSON: {0}")]
    Encode(serde_json::Error),

    #[error("failed to write updated JSON file: {0}")]
    Write(std::io::Error),
}

/// Summary of a rewrite pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FixReport {
    pub updated: usize,
    pub failed: usize,
}

/// Local media path for a sidecar's item
pub fn local_media_path(sidecar: &Path, product_id: &str, media_extension: &str) -> PathBuf {
    let dir = sidecar.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{}.{}", product_id, media_extension))
}

/// Rewrite one sidecar in place, returning the updated item
pub fn fix_sidecar(path: &Path, media_extension: &str) -> Result<ContentItem, SidecarError> {
    let data = std::fs::read(path).map_err(SidecarError::Read)?;
    let mut item: ContentItem = serde_json::from_slice(&data).map_err(SidecarError::Parse)?;

    item.media_url = local_media_path(path, &item.product_id, media_extension)
        .to_string_lossy()
        .into_owned();

    let updated = serde_json::to_string_pretty(&item).map_err(SidecarError::Encode)?;
    std::fs::write(path, updated).map_err(SidecarError::Write)?;
    Ok(item)
}

/// Rewrite every `*.json` sidecar below `root`
///
/// Per-file failures are logged and counted; only an unreadable root, or one
/// that is not a directory, is an error.
pub fn fix_sidecars(root: &Path, media_extension: &str) -> kiosk_common::Result<FixReport> {
    if !std::fs::metadata(root)?.is_dir() {
        return Err(kiosk_common::Error::InvalidInput(format!(
            "content root {} is not a directory",
            root.display()
        )));
    }
    info!(root = %root.display(), "Starting sidecar correction");

    let mut report = FixReport::default();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Failed to access path");
                report.failed += 1;
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        match fix_sidecar(path, media_extension) {
            Ok(item) => {
                info!(path = %path.display(), media_url = %item.media_url, "Updated sidecar");
                report.updated += 1;
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to fix sidecar");
                report.failed += 1;
            }
        }
    }

    info!(updated = report.updated, failed = report.failed, "Sidecar correction completed");
    Ok(report)
}
