//! Request scoping, timing and error normalisation.

use std::time::Instant;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use common::{AppError, CallContext};

/// Largest non-JSON error body read back when rewriting it.
const ERROR_BODY_LIMIT: usize = 64 * 1024;

/// Header names used to carry the flow correlation id.
#[derive(Debug, Clone)]
pub struct CorrelationHeaders {
    pub incoming: HeaderName,
    pub outgoing: HeaderName,
}

/// Run the request in its own call context.
///
/// The flow id comes from the incoming header or is generated, and is echoed
/// on the outgoing header.
pub async fn correlation_scope(
    State(headers): State<CorrelationHeaders>,
    request: Request,
    next: Next,
) -> Response {
    let incoming = request
        .headers()
        .get(&headers.incoming)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned);

    CallContext::scope(async move {
        if let Some(flow_id) = incoming {
            CallContext::set_flow_correlation_id(flow_id);
        }
        let flow_id = CallContext::get_flow_correlation_id();
        let span = tracing::info_span!("request", flow_id = %flow_id);

        let mut response = next.run(request).instrument(span).await;
        if let Ok(value) = HeaderValue::from_str(&flow_id) {
            response.headers_mut().insert(headers.outgoing, value);
        }
        response
    })
    .await
}

/// Log the wall time of every request.
pub async fn log_timing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let start = Instant::now();

    let response = next.run(request).await;

    let wall_ms = (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;
    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        wall_ms,
        "request timing"
    );
    response
}

/// Turn non-JSON error responses (router rejections, 405s, ...) into
/// JSON:API documents.
pub async fn normalize_errors(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(&response) {
        return response;
    }

    let detail = match to_bytes(response.into_body(), ERROR_BODY_LIMIT).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(_) => String::new(),
    };
    AppError::http(status, detail).into_response()
}

fn is_json(response: &Response<Body>) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}
