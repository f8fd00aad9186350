//! Example Service Library
//!
//! Reference service wiring every layer together: a Postgres repository and
//! an HTTP gateway feed the `GetExample` use case, which is reachable both
//! over the web API and as a queue-triggered direct endpoint.

pub mod adapters;
pub mod api;
pub mod direct;
pub mod settings;
pub mod usecase;

use std::sync::Arc;

use axum::Router;

use common::{AppError, AppResult};
use endpoints::{
    create_app, BearerAuthenticationBackend, DirectEndpoint, DirectEndpointApp, JwtAuthenticationBackend,
    PassedAuthenticationBackend,
};
use stores::{connect_store, StoreHandle};
use usecases::Container;

use crate::adapters::{ExampleHttpGateway, ExamplePostgresRepo};
use crate::api::ExampleApi;
use crate::direct::ExampleDirect;
use crate::settings::ServiceSettings;
use crate::usecase::{ExampleUsecases, GetExample};

/// Everything a process needs to serve requests or events.
pub struct Handlers {
    pub container: Container,
    pub api: Router,
    pub direct: DirectEndpointApp,
}

/// Connect the store and build the handlers.
pub async fn microservice_base(settings: ServiceSettings) -> AppResult<Handlers> {
    let store = connect_store(&settings.base.store).await?;
    build_handlers(settings, store)
}

/// Build the handlers over an existing store handle.
pub fn build_handlers(settings: ServiceSettings, store: StoreHandle) -> AppResult<Handlers> {
    let container = Container::new(settings.base.clone(), store);

    let gateway = Arc::new(ExampleHttpGateway::new(settings.gateway.example.clone())?);
    let get_example = GetExample::new(
        container.store().postgres()?,
        settings.usecase.clone(),
        Arc::new(ExamplePostgresRepo),
        gateway,
    );
    container.register(ExampleUsecases {
        get_example: Arc::new(get_example),
    });

    let auth = settings.jwt_secret.as_deref().map(|secret| {
        tracing::info!("bearer authentication enabled");
        Arc::new(JwtAuthenticationBackend::new(secret)) as Arc<dyn BearerAuthenticationBackend>
    });
    let api = create_app(container.clone(), vec![Arc::new(ExampleApi)], auth)?;

    let direct_endpoints: Vec<Arc<dyn DirectEndpoint>> = vec![Arc::new(ExampleDirect::new(container.clone()))];
    let direct = DirectEndpointApp::new(settings.base.api.flow_correlation_id_incoming_header.clone())
        .add_endpoints(
            Some(PassedAuthenticationBackend::new(settings.base.app.admin_auth_id.clone())),
            &direct_endpoints,
        )?;

    Ok(Handlers { container, api, direct })
}

/// Serve the web API until Ctrl+C.
pub async fn run_server(host: &str, port: u16, api: Router) -> AppResult<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, api)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received shutdown signal, stopping server...");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use common::StoreError;

    use crate::direct::EXAMPLE_EVENTS_ENDPOINT;
    use crate::usecase::testing::{settings, store};

    #[tokio::test]
    async fn test_handlers_wire_api_and_direct_endpoints() {
        let settings = settings();
        let handlers = build_handlers(settings.clone(), store(&settings)).unwrap();

        assert!(handlers.container.contains::<ExampleUsecases>());
        let names: Vec<_> = handlers.direct.endpoint_names().collect();
        assert_eq!(names, [EXAMPLE_EVENTS_ENDPOINT]);

        let response = handlers
            .api
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"version": "0.3.0"}));
    }

    #[tokio::test]
    async fn test_jwt_secret_enables_bearer_authentication() {
        let mut settings = settings();
        settings.jwt_secret = Some("secret".into());
        let handlers = build_handlers(settings.clone(), store(&settings)).unwrap();

        let response = handlers
            .api
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Authorization", "Basic abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_requires_postgres_store() {
        use stores::dynamodb::{DynamoDbBackend, DynamoDbConnection};

        let settings = settings();
        let dynamo = common::DynamoDbSettings {
            region: "eu-west-1".into(),
            one_table_name: "app".into(),
            endpoint_url: None,
            retry: common::ConnectRetrySettings {
                max_timeout_seconds: 1,
                max_total_delay_seconds: 1,
            },
        };
        let store = StoreHandle::DynamoDb(Arc::new(DynamoDbConnection::new(DynamoDbBackend::new(dynamo))));

        let err = build_handlers(settings, store).err().unwrap();
        assert!(matches!(err, AppError::Store(StoreError::Base(_))));
    }
}
