//! HTTP gateway to other services.
//!
//! Requests carry the flow correlation id, are retried on transport errors
//! and 5xx answers, and JSON:API error bodies are turned back into
//! [`GatewayError`]s.

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use common::{retry, CallContext, GatewayError, HttpGatewaySettings, JsonApiErrors, RetryPolicy};

/// One outbound call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    params: Vec<(String, String)>,
    json: Option<Value>,
}

impl ApiRequest {
    /// `path` is joined to the gateway URL unless it is already absolute.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            params: Vec::new(),
            json: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// `Authorization: Bearer <token>`.
    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }
}

/// Why a single attempt did not produce a usable response.
enum AttemptError {
    Transport(reqwest::Error),
    ServerError(Response),
}

/// Base for gateways talking JSON to another service.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    name: String,
    settings: HttpGatewaySettings,
    client: Client,
    policy: RetryPolicy,
}

impl HttpGateway {
    pub fn new(name: impl Into<String>, settings: HttpGatewaySettings) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .build()
            .map_err(|e| GatewayError::Base(format!("Unknown error: {e}")))?;
        let policy = settings.policy();

        Ok(Self {
            name: name.into(),
            settings,
            client,
            policy,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &HttpGatewaySettings {
        &self.settings
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.settings.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn attempt(&self, request: &ApiRequest, url: &str) -> Result<Response, AttemptError> {
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(
                self.settings.correlation_id_header.as_str(),
                CallContext::get_flow_correlation_id(),
            )
            .query(&request.params);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(AttemptError::Transport)?;
        if response.status().is_server_error() {
            return Err(AttemptError::ServerError(response));
        }
        Ok(response)
    }

    /// Send the request and return the successful response as is.
    pub async fn call_api_raw(&self, request: ApiRequest) -> Result<Response, GatewayError> {
        let url = self.url(&request.path);
        tracing::debug!(gateway = %self.name, method = %request.method, url = %url, "calling api");

        let outcome = retry(&self.policy, || self.attempt(&request, &url), |_| true).await;
        let response = match outcome {
            Ok(response) => response,
            Err(AttemptError::ServerError(response)) => response,
            Err(AttemptError::Transport(err)) => {
                tracing::warn!(gateway = %self.name, error = %err, "api call failed");
                return Err(GatewayError::Base(format!("Unknown error: {err}")));
            }
        };

        if response.status().is_client_error() || response.status().is_server_error() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }

    /// Send the request and decode the JSON answer.
    pub async fn call_api<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, GatewayError> {
        self.call_api_raw(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Base(format!("Unknown error: {e}")))
    }
}

async fn error_from_response(response: Response) -> GatewayError {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => return GatewayError::Base(format!("Unknown error: {err}")),
    };
    error_from_body(status, &body)
}

/// Map a JSON:API error body to a gateway error.
pub fn error_from_body(status: StatusCode, body: &str) -> GatewayError {
    let unexpected = || GatewayError::Base(format!("unexpected error format: {body}"));

    let Ok(Value::Object(doc)) = serde_json::from_str::<Value>(body) else {
        return unexpected();
    };
    if doc.len() != 1 || !doc.contains_key("errors") {
        return unexpected();
    }
    let Ok(errors) = serde_json::from_value::<JsonApiErrors>(Value::Object(doc)) else {
        return unexpected();
    };

    let detail = errors.joined_details();
    match status {
        StatusCode::NOT_FOUND => GatewayError::NotFound(detail),
        StatusCode::UNPROCESSABLE_ENTITY => GatewayError::NotValid(detail),
        _ => GatewayError::Base(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::http::HeaderMap;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    fn settings(url: String) -> HttpGatewaySettings {
        HttpGatewaySettings {
            url,
            correlation_id_header: "X-Flow-ID".into(),
            retry_attempts: 3,
            retry_sleep_time_seconds: 0.0,
        }
    }

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn echo(Path(id): Path<String>, headers: HeaderMap) -> Json<Value> {
        let flow = headers
            .get("X-Flow-ID")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Json(json!({"id": id, "flow": flow}))
    }

    async fn missing() -> impl IntoResponse {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"errors": [{"status": 404, "title": "Not Found", "detail": "no example"}]})),
        )
    }

    async fn invalid() -> impl IntoResponse {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"errors": [
                {"status": 422, "detail": "field required :name"},
                {"status": 422, "detail": "too short :code"}
            ]})),
        )
    }

    async fn flaky(State(calls): State<Arc<AtomicU32>>) -> impl IntoResponse {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
            (StatusCode::BAD_GATEWAY, Json(json!({"errors": [{"detail": "upstream"}]})))
        } else {
            (StatusCode::OK, Json(json!({"ok": true})))
        }
    }

    async fn down() -> impl IntoResponse {
        (StatusCode::INTERNAL_SERVER_ERROR, "plain text failure")
    }

    async fn gateway(calls: Arc<AtomicU32>) -> HttpGateway {
        let app = Router::new()
            .route("/examples/:id", get(echo))
            .route("/missing", get(missing))
            .route("/invalid", get(invalid))
            .route("/flaky", get(flaky))
            .route("/down", get(down))
            .with_state(calls);
        HttpGateway::new("test", settings(spawn(app).await)).unwrap()
    }

    #[tokio::test]
    async fn test_success_sends_flow_id() {
        let gw = gateway(Arc::default()).await;

        let body: Value = CallContext::scope(async {
            CallContext::set_flow_correlation_id("flow-1");
            gw.call_api(ApiRequest::get("/examples/42")).await
        })
        .await
        .unwrap();

        assert_eq!(body, json!({"id": "42", "flow": "flow-1"}));
    }

    #[tokio::test]
    async fn test_not_found_and_not_valid() {
        let gw = gateway(Arc::default()).await;

        let err = gw.call_api::<Value>(ApiRequest::get("missing")).await.unwrap_err();
        assert_eq!(err, GatewayError::NotFound("no example".into()));

        let err = gw.call_api::<Value>(ApiRequest::get("invalid")).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::NotValid("field required :name; too short :code".into())
        );
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let gw = gateway(calls.clone()).await;

        let body: Value = gw.call_api(ApiRequest::get("flaky")).await.unwrap();

        assert_eq!(body, json!({"ok": true}));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_json_api_error_body() {
        let gw = gateway(Arc::default()).await;

        let err = gw.call_api::<Value>(ApiRequest::get("down")).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Base("unexpected error format: plain text failure".into())
        );
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let gw = HttpGateway::new("test", settings("http://127.0.0.1:9".into())).unwrap();

        let err = gw.call_api::<Value>(ApiRequest::get("x")).await.unwrap_err();
        assert!(err.detail().starts_with("Unknown error: "));
    }

    #[test]
    fn test_error_body_with_extra_keys() {
        let err = error_from_body(
            StatusCode::BAD_REQUEST,
            r#"{"errors": [{"detail": "x"}], "meta": {}}"#,
        );
        assert!(matches!(err, GatewayError::Base(msg) if msg.starts_with("unexpected error format")));
    }

    #[test]
    fn test_url_join() {
        let gw = HttpGateway::new("test", settings("http://svc/base/".into())).unwrap();
        assert_eq!(gw.url("/items"), "http://svc/base/items");
        assert_eq!(gw.url("https://other/x"), "https://other/x");
    }
}
