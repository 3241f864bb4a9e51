//! Request and response types that cross the HTTP boundary.
//!
//! All of them live for a single request/response cycle; nothing is cached
//! or persisted.

use serde::{Deserialize, Serialize};

/// Body of `POST /convert`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversionRequest {
    pub url: String,
}

/// Converted document plus the media type it was served as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub mime_type: String,
    pub markdown: String,
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
