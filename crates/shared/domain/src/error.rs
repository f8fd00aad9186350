//! Domain-level errors.
//!
//! These errors represent rule violations in the shared value objects.
//! They are independent of infrastructure concerns (HTTP, stores, queues).

use thiserror::Error;

/// Domain-specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed for a field or input
    #[error("{0}")]
    Validation(String),

    /// Value could not be parsed
    #[error("invalid {kind}: {value}")]
    Parse { kind: &'static str, value: String },
}

impl DomainError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    /// Create a parse error
    pub fn parse(kind: &'static str, value: impl Into<String>) -> Self {
        DomainError::Parse {
            kind,
            value: value.into(),
        }
    }
}

/// Result type alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
