//! Route definitions for web server.

use axum::extract::{DefaultBodyLimit, State};
use axum::{routing::get, Json, Router};
use serde::Serialize;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use super::{webhook, AppState};

/// Far above any Cloud API callback; only a runaway sender hits it and
/// gets a 413 instead of the usual acknowledgement.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub uptime_secs: u64,
}

/// Create the full app router.
pub fn create_app_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", get(webhook::verify).post(webhook::receive))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        uptime_secs: state.started.elapsed().as_secs(),
    })
}
