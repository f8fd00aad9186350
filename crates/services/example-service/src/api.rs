//! Example HTTP routes.

use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::openapi::OpenApi as OpenApiDoc;
use utoipa::{OpenApi, ToSchema};

use common::{AppResult, JsonApiErrors};
use endpoints::{ApiEndpoint, HttpResponseWrapper};
use usecases::{Container, Pagination};

use crate::usecase::{ExampleDto, ExampleUsecases, GetExampleReq};

/// Documented shape of `HttpResponseWrapper<ExampleDto>`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExampleResponse {
    pub data: Option<ExampleDto>,
    pub pagination: Option<Pagination>,
}

/// Retrieve an example
#[utoipa::path(
    get,
    path = "/example/{example_id}",
    tag = "Example",
    params(("example_id" = String, Path, description = "The id.")),
    responses(
        (status = 200, description = "The example data", body = ExampleResponse),
        (status = 403, description = "Resources not available for the user.", body = JsonApiErrors),
        (status = 404, description = "Resources does not exists.", body = JsonApiErrors),
        (status = 500, description = "Internal server error.", body = JsonApiErrors)
    )
)]
async fn get_example(
    State(container): State<Container>,
    Path(example_id): Path<String>,
) -> AppResult<HttpResponseWrapper<ExampleDto>> {
    let usecases = container.get::<ExampleUsecases>()?;
    let res = usecases.get_example.execute(GetExampleReq { example_id }).await?;
    Ok(HttpResponseWrapper::new(res))
}

#[derive(OpenApi)]
#[openapi(
    paths(get_example),
    components(schemas(ExampleResponse, ExampleDto)),
    tags((name = "Example", description = "Example resources"))
)]
struct ExampleApiDoc;

pub struct ExampleApi;

impl ApiEndpoint for ExampleApi {
    fn routes(&self) -> Router<Container> {
        Router::new().route("/example/:example_id", get(get_example))
    }

    fn openapi(&self) -> OpenApiDoc {
        ExampleApiDoc::openapi()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use endpoints::create_app;

    use crate::usecase::testing::container;

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let app = create_app(container(), vec![Arc::new(ExampleApi)], None).unwrap();
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_get_example() {
        let (status, body) = get_json("/api/v0/example/ex-1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "data": {
                    "usecase_value": "acc-1",
                    "store_value": {"json_data": {"example_id": "ex-1"}},
                    "gateway_value": "example_gateway ex-1"
                },
                "pagination": null
            })
        );
    }

    #[tokio::test]
    async fn test_missing_example_is_404() {
        let (status, body) = get_json("/api/v0/example/missing").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errors"][0]["detail"], "element not found for id=missing");
    }

    #[tokio::test]
    async fn test_path_is_documented() {
        let (status, body) = get_json("/openapi.json").await;

        assert_eq!(status, StatusCode::OK);
        let op = &body["paths"]["/api/v0/example/{example_id}"]["get"];
        assert_eq!(op["tags"], json!(["Example"]));
        assert!(op["responses"]["404"].is_object());
        assert!(body["components"]["schemas"]["ExampleDto"].is_object());
    }
}
