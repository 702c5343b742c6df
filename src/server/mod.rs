//! Demo server: generic routes, optional authenticated `/me`, request logging

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{extract::FromRef, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use crate::api::generic_routes;
use crate::auth::Auth;
use crate::config::Config;
use crate::middleware::{add_request_logging, CurrentUser};

/// State for routes that need token validation
#[derive(Clone, FromRef)]
pub struct AppState {
    pub auth: Auth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub username: String,
}

async fn me(CurrentUser(username): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse { username })
}

/// Build the full router for `config`.
pub fn build_router(config: &Config) -> Result<Router> {
    let mut router = generic_routes(config.app.clone());

    if let Some(auth_config) = &config.auth {
        let auth = Auth::new(auth_config.clone()).context("Invalid auth configuration")?;
        router = router.merge(
            Router::new()
                .route("/me", get(me))
                .with_state(AppState { auth }),
        );
    }

    Ok(add_request_logging(router))
}

/// Serve `router` on `listener` until the process stops.
pub async fn serve(listener: TcpListener, router: Router) -> Result<()> {
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("HTTP server failed")
}

/// Run the server
pub async fn run(config: Config) -> Result<()> {
    let router = build_router(&config)?;
    let http_addr = config.http_addr();

    let listener = TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("Failed to bind {http_addr}"))?;
    info!("HTTP server started on {}", http_addr);

    serve(listener, router).await
}
