//! Service layer types

use serde::{Deserialize, Serialize};

/// An upload as received from a client
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
    /// Allow WebP transcoding when the original does not fit
    pub convert_webp: bool,
}

/// Result of a create or update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub id: String,
    pub filename: String,
    pub size_b64: usize,
}

/// Metadata entry returned by list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: String,
    pub filename: Option<String>,
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
    pub size_b64: usize,
}

/// Decoded image ready to be sent back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageContent {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub id: String,
    pub deleted: bool,
}

/// Health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResult {
    pub healthy: bool,
    pub version: String,
}
