//! JSON:API error documents.
//!
//! Every error leaving a service, and every error read back from another
//! service by the HTTP gateway, uses this shape:
//!
//! ```json
//! {"errors": [{"status": 404, "title": "Not Found", "detail": "...", "code": "NOT_FOUND"}]}
//! ```

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// A single JSON:API error object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(deny_unknown_fields)]
pub struct JsonApiError {
    /// HTTP status code
    #[serde(default)]
    pub status: Option<u16>,
    /// Short, human-readable summary of the problem type
    #[serde(default)]
    pub title: Option<String>,
    /// Human-readable explanation specific to the problem
    #[serde(default)]
    pub detail: Option<String>,
    /// Application-specific error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Top-level JSON:API error document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(deny_unknown_fields)]
pub struct JsonApiErrors {
    pub errors: Vec<JsonApiError>,
}

impl JsonApiErrors {
    /// Details of every error joined with `"; "`.
    pub fn joined_details(&self) -> String {
        self.errors
            .iter()
            .filter_map(|e| e.detail.as_deref())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Build a single-error document; the title is the canonical reason phrase.
pub fn format_error_response(
    status: StatusCode,
    message: Option<String>,
    code: Option<String>,
) -> JsonApiErrors {
    JsonApiErrors {
        errors: vec![JsonApiError {
            status: Some(status.as_u16()),
            title: status.canonical_reason().map(str::to_string),
            detail: message,
            code,
        }],
    }
}
