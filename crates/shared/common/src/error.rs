//! Layered error handling.
//!
//! Each layer owns an error enum (stores, gateways, use cases, direct
//! endpoints). `AppError` wraps all of them and is the only type that knows
//! about HTTP: it picks the status code and renders the JSON:API body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use thiserror::Error;

use crate::json_api::format_error_response;

// =============================================================================
// Layer errors
// =============================================================================

/// Errors raised by store adapters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0}")]
    Base(String),

    #[error("{0}")]
    DuplicateKey(String),

    #[error("{0}")]
    Connection(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ForeignKeyViolation(String),
}

impl StoreError {
    pub fn detail(&self) -> &str {
        match self {
            StoreError::Base(d)
            | StoreError::DuplicateKey(d)
            | StoreError::Connection(d)
            | StoreError::NotFound(d)
            | StoreError::ForeignKeyViolation(d) => d,
        }
    }

    pub fn base(detail: impl Into<String>) -> Self {
        StoreError::Base(detail.into())
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        StoreError::NotFound(detail.into())
    }

    pub fn duplicate_key(detail: impl Into<String>) -> Self {
        StoreError::DuplicateKey(detail.into())
    }
}

/// Errors raised by outbound gateways.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{0}")]
    Base(String),

    #[error("{0}")]
    NotValid(String),

    #[error("{0}")]
    NotFound(String),
}

impl GatewayError {
    pub fn detail(&self) -> &str {
        match self {
            GatewayError::Base(d) | GatewayError::NotValid(d) | GatewayError::NotFound(d) => d,
        }
    }
}

/// Errors raised by use cases.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsecaseError {
    #[error("{0}")]
    Base(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    NotValidRequest(String),
}

impl UsecaseError {
    pub fn detail(&self) -> &str {
        match self {
            UsecaseError::Base(d)
            | UsecaseError::Forbidden(d)
            | UsecaseError::AlreadyExists(d)
            | UsecaseError::NotValidRequest(d) => d,
        }
    }

    pub fn not_valid_request(detail: impl Into<String>) -> Self {
        UsecaseError::NotValidRequest(detail.into())
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        UsecaseError::Forbidden(detail.into())
    }
}

/// Errors raised while dispatching queue-triggered endpoints.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectEndpointError {
    #[error("{0}")]
    Base(String),

    #[error("{0}")]
    InvalidAccountIds(String),
}

/// Settings could not be loaded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(String),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

// =============================================================================
// Application error
// =============================================================================

/// Top-level error returned by handlers and endpoints.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Usecase(#[from] UsecaseError),

    #[error(transparent)]
    DirectEndpoint(#[from] DirectEndpointError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    // Authentication & Authorization
    #[error("{0}")]
    Authentication(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    // Plain HTTP errors (unknown route, wrong method, ...)
    #[error("{detail}")]
    Http { status: StatusCode, detail: String },

    // Request validation
    #[error("{0}")]
    Validation(String),

    // Internal
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Store(StoreError::DuplicateKey(_)) => "DUPLICATE_KEY",
            AppError::Store(StoreError::NotFound(_)) => "NOT_FOUND",
            AppError::Store(StoreError::ForeignKeyViolation(_)) => "FOREIGN_KEY_VIOLATION",
            AppError::Store(_) => "STORE_ERROR",
            AppError::Usecase(UsecaseError::Forbidden(_)) => "FORBIDDEN",
            AppError::Usecase(UsecaseError::AlreadyExists(_)) => "ALREADY_EXISTS",
            AppError::Usecase(_) => "BAD_REQUEST",
            AppError::Authentication(_) | AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::Http { .. } => "HTTP_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Gateway(_)
            | AppError::DirectEndpoint(_)
            | AppError::Config(_)
            | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Store(StoreError::ForeignKeyViolation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Store(StoreError::DuplicateKey(_)) => StatusCode::CONFLICT,
            AppError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Usecase(UsecaseError::Forbidden(_)) => StatusCode::FORBIDDEN,
            AppError::Usecase(UsecaseError::AlreadyExists(_)) => StatusCode::CONFLICT,
            AppError::Usecase(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Http { status, .. } => *status,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Inner message without the variant prefix.
    pub fn detail(&self) -> String {
        match self {
            AppError::Store(e) => e.detail().to_string(),
            AppError::Usecase(e) => e.detail().to_string(),
            AppError::Gateway(e) => e.detail().to_string(),
            AppError::Internal(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// Get user-facing message (hides internal details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::Store(e) => {
                tracing::error!("Store exception: {}", e);
                e.detail().to_string()
            }
            AppError::Usecase(e) => {
                tracing::error!("Usecase exception: {}", e);
                e.detail().to_string()
            }
            AppError::Http { status, detail } if detail.is_empty() => {
                status.canonical_reason().unwrap_or_default().to_string()
            }
            AppError::Validation(msg) if msg.is_empty() => "Request validation error".to_string(),
            AppError::Gateway(e) => {
                tracing::error!("Unhandled exception: {:?}", e);
                "Something went wrong".to_string()
            }
            AppError::DirectEndpoint(e) => {
                tracing::error!("Unhandled exception: {:?}", e);
                "Something went wrong".to_string()
            }
            AppError::Config(e) => {
                tracing::error!("Unhandled exception: {:?}", e);
                "Something went wrong".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Unhandled exception: {}", msg);
                "Something went wrong".to_string()
            }

            // Use default message for others
            _ => self.to_string(),
        }
    }
}

// =============================================================================
// HTTP Response (Axum)
// =============================================================================

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = format_error_response(
            status,
            Some(self.user_message()),
            Some(self.code().to_string()),
        );

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Domain Error Conversion
// =============================================================================

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::Usecase(UsecaseError::NotValidRequest(err.to_string()))
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Convenience constructors
impl AppError {
    pub fn authentication(msg: impl Into<String>) -> Self {
        AppError::Authentication(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    pub fn http(status: StatusCode, detail: impl Into<String>) -> Self {
        AppError::Http {
            status,
            detail: detail.into(),
        }
    }
}
