//! REST API request/response data transfer objects

use serde::{Deserialize, Serialize};

/// Query parameters accepted by upload and update
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub convert_webp: Option<String>,
}

/// Upload / update response
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    pub filename: String,
    pub size_b64: usize,
}

/// List entry
#[derive(Debug, Serialize, Deserialize)]
pub struct ImageSummaryDto {
    pub id: String,
    pub filename: Option<String>,
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
    pub size_b64: usize,
}

/// Delete response
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub id: String,
    pub deleted: bool,
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            code: code.to_string(),
        }
    }
}
