//! Response envelope shared by API endpoints.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use usecases::Pagination;

/// `{"data": ..., "pagination": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponseWrapper<D> {
    pub data: Option<D>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl<D> HttpResponseWrapper<D> {
    pub fn new(data: D) -> Self {
        Self {
            data: Some(data),
            pagination: None,
        }
    }

    pub fn paginated(data: D, pagination: Pagination) -> Self {
        Self {
            data: Some(data),
            pagination: Some(pagination),
        }
    }
}

impl<D: Serialize> IntoResponse for HttpResponseWrapper<D> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
