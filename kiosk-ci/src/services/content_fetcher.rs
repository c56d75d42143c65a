//! Content fetcher
//!
//! Downloads one media item and stores it next to a JSON metadata sidecar:
//!
//! ```text
//! <project_dir>/<productId>.<ext>    raw media bytes
//! <project_dir>/<productId>.json     ContentItem as JSON
//! ```
//!
//! Both artifacts are staged under a per-fetch `.part` name and renamed into
//! place only once fully written, so a crash or failed transfer never exposes
//! a half-written file and never disturbs an artifact stored by an earlier
//! request. Concurrent fetches of one product meet only at the rename; the
//! last rename wins.

use futures::StreamExt;
use kiosk_common::ContentItem;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("kiosk-ci/", env!("CARGO_PKG_VERSION"));
const STAGING_SUFFIX: &str = ".part";

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Per-item fetch failure
///
/// Display text is reported verbatim to the control plane inside
/// `partial_success` responses.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid product id: {0:?}")]
    InvalidProductId(String),

    #[error("failed to download content: {0}")]
    Transport(String),

    #[error("failed to download content: timed out")]
    Timeout,

    #[error("failed to download content, status: {0}")]
    Status(u16),

    #[error("failed to create file: {0}")]
    CreateFile(std::io::Error),

    #[error("failed to save content: {0}")]
    SaveContent(String),

    #[error("failed to create metadata file: {0}")]
    CreateMetadata(std::io::Error),

    #[error("failed to save metadata: {0}")]
    SaveMetadata(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Downloads content items into a project directory
#[derive(Clone)]
pub struct ContentFetcher {
    http_client: reqwest::Client,
    media_extension: String,
}

impl ContentFetcher {
    /// Build a fetcher with its own HTTP client
    ///
    /// `timeout` of `None` lets a download block until the transport
    /// resolves or errors.
    pub fn new(media_extension: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self::with_client(http_client, media_extension))
    }

    pub fn with_client(http_client: reqwest::Client, media_extension: &str) -> Self {
        Self {
            http_client,
            media_extension: media_extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn media_extension(&self) -> &str {
        &self.media_extension
    }

    /// Final location of an item's media bytes
    pub fn media_path(&self, project_dir: &Path, product_id: &str) -> PathBuf {
        project_dir.join(format!("{}.{}", product_id, self.media_extension))
    }

    /// Final location of an item's metadata sidecar
    pub fn metadata_path(project_dir: &Path, product_id: &str) -> PathBuf {
        project_dir.join(format!("{}.json", product_id))
    }

    /// Download `item.media_url` and store media plus sidecar
    ///
    /// `project_dir` must already exist.
    pub async fn fetch(&self, project_dir: &Path, item: &ContentItem) -> Result<(), FetchError> {
        if !is_safe_file_stem(&item.product_id) {
            return Err(FetchError::InvalidProductId(item.product_id.clone()));
        }

        debug!(product_id = %item.product_id, url = %item.media_url, "Downloading content");

        let response = self.http_client.get(&item.media_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let media_path = self.media_path(project_dir, &item.product_id);
        let staging = staging_path(&media_path);
        let written = match stream_to_file(response, &staging).await {
            Ok(written) => written,
            Err(e) => {
                discard(&staging).await;
                return Err(e);
            }
        };
        if let Err(e) = tokio::fs::rename(&staging, &media_path).await {
            discard(&staging).await;
            return Err(FetchError::SaveContent(e.to_string()));
        }

        let metadata_path = Self::metadata_path(project_dir, &item.product_id);
        write_sidecar(item, &metadata_path).await?;

        info!(
            product_id = %item.product_id,
            bytes = written,
            path = %media_path.display(),
            "Saved content and metadata"
        );
        Ok(())
    }
}

/// Stream a response body into `path`, returning the byte count
async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<u64, FetchError> {
    let mut file = File::create(path).await.map_err(FetchError::CreateFile)?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::SaveContent(e.to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| FetchError::SaveContent(e.to_string()))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| FetchError::SaveContent(e.to_string()))?;
    Ok(written)
}

async fn write_sidecar(item: &ContentItem, path: &Path) -> Result<(), FetchError> {
    let mut encoded =
        serde_json::to_vec(item).map_err(|e| FetchError::SaveMetadata(e.to_string()))?;
    encoded.push(b'\n');

    let staging = staging_path(path);
    let result = async {
        let mut file = File::create(&staging)
            .await
            .map_err(FetchError::CreateMetadata)?;
        file.write_all(&encoded)
            .await
            .map_err(|e| FetchError::SaveMetadata(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| FetchError::SaveMetadata(e.to_string()))?;
        tokio::fs::rename(&staging, path)
            .await
            .map_err(|e| FetchError::SaveMetadata(e.to_string()))
    }
    .await;

    if result.is_err() {
        discard(&staging).await;
    }
    result
}

/// Fresh sibling path used while an artifact is being written
///
/// Every call yields a distinct name (`<file>.<pid>-<seq>.part`), so
/// concurrent fetches of the same product never share a staging file.
pub fn staging_path(path: &Path) -> PathBuf {
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}-{}{}", std::process::id(), seq, STAGING_SUFFIX));
    PathBuf::from(name)
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(path = %path.display(), error = %e, "Failed to remove staging file");
        }
    }
}

/// True when `name` can be used as a single file or directory name
pub fn is_safe_file_stem(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_paths_are_unique_siblings() {
        let path = Path::new("/srv/content/p1/sku1.mp4");
        let first = staging_path(path);
        let second = staging_path(path);

        assert_ne!(first, second);
        for staged in [&first, &second] {
            assert_eq!(staged.parent(), path.parent());
            let name = staged.file_name().unwrap().to_str().unwrap();
            assert!(name.starts_with("sku1.mp4."));
            assert!(name.ends_with(".part"));
        }
    }

    #[test]
    fn test_safe_file_stem() {
        assert!(is_safe_file_stem("sku1"));
        assert!(is_safe_file_stem("sku-1.v2"));
        assert!(!is_safe_file_stem(""));
        assert!(!is_safe_file_stem(".."));
        assert!(!is_safe_file_stem("../etc"));
        assert!(!is_safe_file_stem("a\\b"));
    }

    #[test]
    fn test_artifact_paths() {
        let fetcher = ContentFetcher::with_client(reqwest::Client::new(), ".mp4");
        let dir = Path::new("content/p1");
        assert_eq!(fetcher.media_path(dir, "sku1"), PathBuf::from("content/p1/sku1.mp4"));
        assert_eq!(
            ContentFetcher::metadata_path(dir, "sku1"),
            PathBuf::from("content/p1/sku1.json")
        );
    }

    #[test]
    fn test_status_error_message() {
        assert_eq!(
            FetchError::Status(404).to_string(),
            "failed to download content, status: 404"
        );
    }

    #[tokio::test]
    async fn test_invalid_product_id_touches_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let fetcher = ContentFetcher::with_client(reqwest::Client::new(), "mp4");
        let item = ContentItem {
            product_id: "../escape".to_string(),
            media_url: "http://127.0.0.1:9/never".to_string(),
            nfc_tag_id: "T1".to_string(),
            product_name: "Widget".to_string(),
        };

        let err = fetcher.fetch(dir.path(), &item).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidProductId(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
