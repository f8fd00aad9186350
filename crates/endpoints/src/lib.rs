//! Service surfaces: the web API and queue-triggered direct endpoints.
//!
//! - [`api`]: router factory, response envelope, validated JSON, bearer
//!   authentication and scope checks
//! - [`direct`]: event models and the direct endpoint dispatcher

pub mod api;
pub mod direct;

pub use api::{
    authorize, create_app, ApiEndpoint, HttpResponseWrapper, JwtAuthenticationBackend, RequestUser, ValidatedJson,
};
pub use api::security::BearerAuthenticationBackend;
pub use direct::{DirectEndpoint, DirectEndpointApp, DirectRoute, PassedAuthenticationBackend};
