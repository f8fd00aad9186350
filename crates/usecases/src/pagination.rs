//! Opaque pagination cursors.
//!
//! A cursor is the list request itself, minus its own `cursor` field and
//! unset fields, serialised to JSON and base64 encoded. Passing it back
//! restores the request that produces the next page.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use common::UsecaseError;

/// Range filters shared by list requests; flatten it into the request type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iden_lt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iden_gt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub after_cursor: Option<String>,
    pub has_more: bool,
}

impl Pagination {
    /// Pagination pointing at the page `next` describes.
    pub fn next<R: Serialize>(next: &R) -> Result<Self, UsecaseError> {
        Ok(Self {
            after_cursor: Some(Self::create_cursor(next)?),
            has_more: true,
        })
    }

    /// Last page.
    pub fn last() -> Self {
        Self::default()
    }

    pub fn create_cursor<R: Serialize>(req: &R) -> Result<String, UsecaseError> {
        let mut value = serde_json::to_value(req)
            .map_err(|e| UsecaseError::Base(format!("unable to create cursor: {e}")))?;
        if let Value::Object(map) = &mut value {
            map.remove("cursor");
            map.retain(|_, v| !v.is_null());
        }
        Ok(STANDARD.encode(value.to_string()))
    }

    pub fn parse_cursor<R: DeserializeOwned>(cursor: &str) -> Result<R, UsecaseError> {
        let invalid = || UsecaseError::not_valid_request(format!("invalid pagination cursor: {cursor}"));

        let bytes = STANDARD.decode(cursor.trim()).map_err(|_| invalid())?;
        serde_json::from_slice(&bytes).map_err(|_| invalid())
    }
}
