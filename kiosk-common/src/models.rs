//! Content model pushed by the control plane
//!
//! Field names follow the control plane's camelCase JSON contract; the same
//! encoding is used for the on-disk metadata sidecar.

use serde::{Deserialize, Serialize};

/// One media asset plus its descriptive metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Unique within a project; names the stored artifacts
    pub product_id: String,
    /// Source URI of the media bytes
    pub media_url: String,
    pub nfc_tag_id: String,
    pub product_name: String,
}

/// Inbound batch of content items for one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionRequest {
    pub deployment_id: String,
    /// Storage namespace; must be non-empty
    pub project_id: String,
    pub customer_id: String,
    pub things: Vec<ContentItem>,
}
