//! Endpoints triggered by queue and topic events instead of HTTP.

mod app;
pub mod events;
mod security;

#[cfg(any(test, feature = "test-utils"))]
pub use app::MockDirectEndpoint;
pub use app::{DirectEndpoint, DirectEndpointApp, DirectRoute, ENDPOINT_PREFIX};
pub use events::{SnsNotificationEvent, SqsEvent, SqsRecord};
pub use security::PassedAuthenticationBackend;
