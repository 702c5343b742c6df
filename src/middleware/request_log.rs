//! Request logging middleware
//!
//! Logs every request on the way in and out (except health probes), stamps
//! `X-Process-Time` on the response, and turns handler panics into a JSON 500.

use std::any::Any;
use std::time::Instant;

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{MatchedPath, Request},
    http::{header::CONTENT_TYPE, response::Parts, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;

use super::redact::{sanitize_headers, sanitize_query};

pub const PROCESS_TIME_HEADER: HeaderName = HeaderName::from_static("x-process-time");

/// Largest response body copied into the "Request processed" event.
pub const MAX_LOGGED_BODY_BYTES: u64 = 64 * 1024;

/// Paths matching any of these are served but never logged.
const NOT_LOGGED_PATH_CHECKERS: &[fn(&str) -> bool] = &[is_health_probe];

fn is_health_probe(path: &str) -> bool {
    path.ends_with("/healthz")
}

pub fn should_log_path(path: &str) -> bool {
    !NOT_LOGGED_PATH_CHECKERS.iter().any(|checker| checker(path))
}

/// Wrap `router` with request logging and panic handling.
///
/// Logging sits outside the panic handler so failed requests are logged with
/// their 500 status.
pub fn add_request_logging<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(axum::middleware::from_fn(request_logging_middleware))
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let log_path = should_log_path(&path);
    let path_pattern = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string());
    let method = request.method().clone();

    if log_path {
        tracing::info!(
            request_path = %path,
            request_path_pattern = ?path_pattern,
            request_method = %method,
            query_params = %request.uri().query().map(sanitize_query).unwrap_or_default(),
            headers = ?sanitize_headers(request.headers()),
            "Request received"
        );
    }

    let start_time = Instant::now();
    let response = next.run(request).await;
    let processing_time = start_time.elapsed().as_secs_f64();

    let (mut parts, body) = response.into_parts();
    if let Ok(value) = HeaderValue::from_str(&processing_time.to_string()) {
        parts.headers.insert(PROCESS_TIME_HEADER, value);
    }

    if !log_path {
        return Response::from_parts(parts, body);
    }

    if !should_buffer_body(&parts, &body) {
        tracing::info!(
            request_path = %path,
            request_path_pattern = ?path_pattern,
            request_method = %method,
            processing_time,
            status_code = parts.status.as_u16(),
            response_body = %serde_json::Value::Null,
            "Request processed"
        );
        return Response::from_parts(parts, body);
    }

    // The body is a stream; buffer it for the log and hand back a copy.
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, request_path = %path, "Failed to buffer response body");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "Unexpected server error"})),
            )
                .into_response();
        }
    };

    tracing::info!(
        request_path = %path,
        request_path_pattern = ?path_pattern,
        request_method = %method,
        processing_time,
        status_code = parts.status.as_u16(),
        response_body = %parse_response_body(&bytes),
        "Request processed"
    );

    Response::from_parts(parts, Body::from(bytes))
}

/// Only JSON bodies with a known, small size are buffered; streams pass through.
fn should_buffer_body(parts: &Parts, body: &Body) -> bool {
    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false);

    is_json
        && body
            .size_hint()
            .upper()
            .is_some_and(|size| size <= MAX_LOGGED_BODY_BYTES)
}

/// JSON view of a response body; `null` when empty or not JSON.
fn parse_response_body(bytes: &Bytes) -> Value {
    serde_json::from_slice(bytes).unwrap_or(Value::Null)
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let error = if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else {
        "unknown panic"
    };

    tracing::error!(
        severity = "critical",
        error = %error,
        backtrace = %std::backtrace::Backtrace::capture(),
        "Request failed"
    );

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"message": "Unexpected server error"})),
    )
        .into_response()
}
