//! Common utilities shared across all services.
//!
//! This crate provides:
//! - Layered error taxonomy and the JSON:API error body
//! - Environment-driven settings
//! - Per-call context (correlation ids, authenticated user)
//! - Retry policies for connections and outbound calls
//! - Tracing initialisation and id generation

pub mod config;
pub mod context;
pub mod error;
pub mod id;
pub mod json_api;
pub mod logging;
pub mod retry;

pub use config::*;
pub use context::CallContext;
pub use error::{
    AppError, AppResult, ConfigError, DirectEndpointError, GatewayError, StoreError, UsecaseError,
};
pub use id::new_id;
pub use json_api::{format_error_response, JsonApiError, JsonApiErrors};
pub use retry::{retry, RetryPolicy};
