//! Routes every service exposes: identity, liveness and a forced failure

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderName,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::config::AppInfo;

pub const APP_ALIVE_HEADER: HeaderName = HeaderName::from_static("x-app-alive");

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub application_name: String,
    pub version: String,
    pub client_ip: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
}

/// `GET /`, `GET /health` and `GET /force_exception`, usable under any state.
pub fn generic_routes<S>(app_info: AppInfo) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/force_exception", get(force_exception))
        .with_state(Arc::new(app_info))
}

/// Application identity and the caller's address, when the server records it.
pub async fn root(State(app_info): State<Arc<AppInfo>>, request: Request) -> Json<RootResponse> {
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    Json(RootResponse {
        application_name: app_info.name.clone(),
        version: app_info.version.clone(),
        client_ip,
    })
}

/// Liveness probe
pub async fn health() -> impl IntoResponse {
    (
        [(APP_ALIVE_HEADER, "True")],
        Json(HealthResponse {
            message: "It's alive!".to_string(),
        }),
    )
}

/// Always fails; exercises the error path of the request middleware.
pub async fn force_exception() -> Json<HealthResponse> {
    panic!("This always fails")
}
