//! Web API factory.
//!
//! [`create_app`] mounts every [`ApiEndpoint`] under
//! `{prefix}/api/v{version}`, adds health and documentation routes, and wraps
//! the whole router with CORS, authentication, correlation, timing and error
//! normalisation layers.

pub mod extractors;
pub mod middleware;
pub mod response;
pub mod security;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{request::Parts, HeaderName, HeaderValue, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Json, Router,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::{Info, OpenApi as OpenApiDoc, Server};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_redoc::{Redoc, Servable};
use utoipa_swagger_ui::SwaggerUi;

use common::{AppError, AppResult, AppSettings, ConfigError, JsonApiError, JsonApiErrors};
use usecases::{Container, Pagination};

use self::middleware::{correlation_scope, log_timing, normalize_errors, CorrelationHeaders};
use self::security::{authentication, BearerAuthenticationBackend};

pub use self::extractors::ValidatedJson;
pub use self::response::HttpResponseWrapper;
pub use self::security::{authorize, Claims, JwtAuthenticationBackend, RequestUser};

/// A group of routes plus their OpenAPI description.
pub trait ApiEndpoint: Send + Sync {
    /// Routes relative to the versioned API prefix.
    fn routes(&self) -> Router<Container>;

    /// Paths are relative to the versioned API prefix, like the routes.
    fn openapi(&self) -> OpenApiDoc {
        OpenApiDoc::default()
    }
}

// =============================================================================
// Health & docs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub version: String,
}

/// Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service version", body = HealthResponse)
    )
)]
async fn health(State(container): State<Container>) -> Json<HealthResponse> {
    Json(HealthResponse {
        version: container.settings().app.version.clone(),
    })
}

async fn not_found() -> AppError {
    AppError::http(StatusCode::NOT_FOUND, "")
}

#[derive(OpenApi)]
#[openapi(
    paths(health),
    components(schemas(HealthResponse, JsonApiErrors, JsonApiError, Pagination)),
    modifiers(&SecurityAddon),
    tags((name = "Health", description = "Service health"))
)]
struct BaseApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut OpenApiDoc) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

fn prefix_paths(doc: &mut OpenApiDoc, prefix: &str) {
    if prefix.is_empty() {
        return;
    }
    let paths = std::mem::take(&mut doc.paths.paths);
    doc.paths.paths = paths
        .into_iter()
        .map(|(path, item)| (format!("{prefix}{path}"), item))
        .collect();
}

/// Service document with every endpoint's paths merged in.
pub fn openapi_document(settings: &AppSettings, endpoints: &[Arc<dyn ApiEndpoint>]) -> OpenApiDoc {
    let mut doc = BaseApiDoc::openapi();
    doc.info = Info::new(settings.app.name.clone(), settings.app.version.clone());
    if let Some(root) = settings.api.root_path.as_deref().filter(|r| !r.is_empty()) {
        doc.servers = Some(vec![Server::new(root)]);
    }
    prefix_paths(&mut doc, &settings.api.prefix());

    let api_prefix = settings.api.api_prefix();
    for endpoint in endpoints {
        let mut other = endpoint.openapi();
        prefix_paths(&mut other, &api_prefix);
        doc.merge(other);
    }
    doc
}

// =============================================================================
// Layers
// =============================================================================

fn header_name(var: &str, value: &str) -> Result<HeaderName, ConfigError> {
    HeaderName::from_bytes(value.as_bytes()).map_err(|e| ConfigError::Invalid {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

fn cors_layer(pattern: &str) -> Result<CorsLayer, ConfigError> {
    let origins = Regex::new(pattern).map_err(|e| ConfigError::Invalid {
        var: "CORS_ALLOW_ORIGIN_REGEX".to_string(),
        reason: e.to_string(),
    })?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _: &Parts| {
            origin.to_str().is_ok_and(|o| origins.is_match(o))
        }))
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Build the service router.
pub fn create_app(
    container: Container,
    endpoints: Vec<Arc<dyn ApiEndpoint>>,
    auth: Option<Arc<dyn BearerAuthenticationBackend>>,
) -> AppResult<Router> {
    let settings = container.settings().clone();
    let api = &settings.api;
    let prefix = api.prefix();

    let correlation = CorrelationHeaders {
        incoming: header_name(
            "FLOW_CORRELATION_ID_INCOMING_HEADER",
            &api.flow_correlation_id_incoming_header,
        )?,
        outgoing: header_name(
            "FLOW_CORRELATION_ID_OUTGOING_HEADER",
            &api.correlation_id_outgoing_header,
        )?,
    };
    let cors = cors_layer(&api.cors_allow_origin_regex)?;

    let versioned = endpoints
        .iter()
        .fold(Router::new(), |router, endpoint| router.merge(endpoint.routes()));
    let document = openapi_document(&settings, &endpoints);
    let redoc = Redoc::with_url(format!("{prefix}/redoc"), document.clone());
    let docs =
        SwaggerUi::new(format!("{prefix}/docs")).url(format!("{prefix}/openapi.json"), document);

    let mut app = Router::new()
        .route(&format!("{prefix}/health"), get(health))
        .nest(&api.api_prefix(), versioned)
        .merge(docs)
        .merge(redoc)
        .fallback(not_found)
        .with_state(container)
        .layer(from_fn(normalize_errors));

    if let Some(auth) = auth {
        app = app.layer(from_fn_with_state(auth, authentication));
    }

    tracing::info!(
        service = %settings.app.name,
        api_prefix = %api.api_prefix(),
        endpoints = endpoints.len(),
        "web api created"
    );

    Ok(app
        .layer(from_fn_with_state(correlation, correlation_scope))
        .layer(from_fn(log_timing))
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::body::Body;
    use axum::extract::Path;
    use axum::http::Request;
    use axum::response::Response;
    use domain::USER_GROUP;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use stores::dynamodb::{DynamoDbBackend, DynamoDbConnection};
    use stores::StoreHandle;
    use tower::ServiceExt;

    use common::{EnvReader, StoreSettings};
    use domain::AuthUser;

    fn container(extra: &[(&str, &str)]) -> Container {
        let mut vars: HashMap<String, String> = [
            ("SERVICE_NAME", "items"),
            ("ENV", "test"),
            ("SERVICE_VERSION", "2.0.1"),
            ("ADMIN_AUTH_ID", "admin"),
            ("STORE_BACKEND", "dynamodb"),
            ("NAWS_REGION", "eu-west-1"),
            ("DYNAMO_ONE_TABLE_NAME", "app"),
            ("WEBAPP_TITLE", "Items"),
            ("WEBAPP_VERSION", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let settings = AppSettings::from_reader(&EnvReader::from_map(&vars)).unwrap();
        let StoreSettings::DynamoDb(dynamo) = settings.store.clone() else {
            panic!("expected dynamodb settings");
        };
        let store = StoreHandle::DynamoDb(Arc::new(DynamoDbConnection::new(DynamoDbBackend::new(dynamo))));
        Container::new(settings, store)
    }

    /// Get an item
    #[utoipa::path(
        get,
        path = "/items/{id}",
        tag = "Items",
        params(("id" = u32, Path, description = "Item id")),
        responses((status = 200, description = "The item"))
    )]
    async fn get_item(State(container): State<Container>, Path(id): Path<u32>) -> HttpResponseWrapper<Value> {
        HttpResponseWrapper::new(json!({"id": id, "service": container.settings().app.name}))
    }

    async fn private(user: RequestUser) -> AppResult<Json<Value>> {
        let user = authorize(&user, &[&[USER_GROUP]])?;
        Ok(Json(json!({"user": user.user_id})))
    }

    #[derive(OpenApi)]
    #[openapi(paths(get_item))]
    struct ItemsDoc;

    struct Items;

    impl ApiEndpoint for Items {
        fn routes(&self) -> Router<Container> {
            Router::new()
                .route("/items/:id", get(get_item))
                .route("/private", get(private))
        }

        fn openapi(&self) -> OpenApiDoc {
            ItemsDoc::openapi()
        }
    }

    struct TokenIsUser;

    impl BearerAuthenticationBackend for TokenIsUser {
        fn get_payload_data(&self, token: &str) -> AppResult<AuthUser> {
            Ok(AuthUser::new(token, vec![USER_GROUP.to_string()]))
        }
    }

    fn app(extra: &[(&str, &str)], auth: bool) -> Router {
        let auth: Option<Arc<dyn BearerAuthenticationBackend>> = if auth { Some(Arc::new(TokenIsUser)) } else { None };
        create_app(container(extra), vec![Arc::new(Items)], auth).unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response: Response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_under_further_prefix() {
        let (status, body) = send(app(&[("WEBAPP_FURTHER_PREFIX", "svc")], false), get_req("/svc/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"version": "2.0.1"}));
    }

    #[tokio::test]
    async fn test_endpoint_is_versioned() {
        let (status, body) = send(app(&[], false), get_req("/api/v1/items/7")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"data": {"id": 7, "service": "items"}, "pagination": null}));
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_api_404() {
        let (status, body) = send(app(&[], false), get_req("/nowhere")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errors"][0]["detail"], "Not Found");
        assert_eq!(body["errors"][0]["status"], 404);
    }

    #[tokio::test]
    async fn test_router_rejections_are_json_api() {
        let (status, body) = send(app(&[], false), get_req("/api/v1/items/not-a-number")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["title"], "Bad Request");

        let post = Request::builder()
            .method("POST")
            .uri("/api/v1/items/7")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(&[], false), post).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["errors"][0]["detail"], "Method Not Allowed");
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let (status, body) = send(app(&[], false), get_req("/openapi.json")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["title"], "items");
        assert_eq!(body["info"]["version"], "2.0.1");
        assert!(body["paths"]["/health"].is_object());
        assert!(body["paths"]["/api/v1/items/{id}"].is_object());
    }

    #[tokio::test]
    async fn test_redoc_is_served() {
        let response = app(&[], false).oneshot(get_req("/redoc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_authentication_and_authorization() {
        let (status, _) = send(app(&[], true), get_req("/api/v1/private")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let bad = Request::builder()
            .uri("/api/v1/private")
            .header("Authorization", "Token abc")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(&[], true), bad).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["errors"][0]["detail"], "Authorization scheme is not supported: Token");

        let good = Request::builder()
            .uri("/api/v1/private")
            .header("Authorization", "Bearer u1")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(&[], true), good).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"user": "u1"}));
    }

    #[tokio::test]
    async fn test_flow_id_header_is_echoed() {
        let request = Request::builder()
            .uri("/health")
            .header("X-Flow-ID", "flow-7")
            .body(Body::empty())
            .unwrap();
        let response = app(&[], false).oneshot(request).await.unwrap();

        assert_eq!(response.headers()["x-flow-id"], "flow-7");
    }

    #[tokio::test]
    async fn test_cors_origin_regex() {
        let preflight = |origin: &str| {
            Request::builder()
                .method("OPTIONS")
                .uri("/health")
                .header("Origin", origin)
                .header("Access-Control-Request-Method", "GET")
                .body(Body::empty())
                .unwrap()
        };

        let allowed = app(&[], false).oneshot(preflight("https://app.project.io")).await.unwrap();
        assert_eq!(allowed.headers()["access-control-allow-origin"], "https://app.project.io");

        let denied = app(&[], false).oneshot(preflight("https://evil.example")).await.unwrap();
        assert!(denied.headers().get("access-control-allow-origin").is_none());
    }

    #[test]
    fn test_invalid_cors_regex() {
        let err = create_app(container(&[("CORS_ALLOW_ORIGIN_REGEX", "(")]), vec![], None).unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::Invalid { var, .. }) if var == "CORS_ALLOW_ORIGIN_REGEX"));
    }
}
