//! Axum router configuration with middleware.
//!
//! Routes: `POST /webhook/{bot}` (plus the bare `/webhook` and `/webhook/`
//! forms, which the dispatcher rejects with 400) and `GET /health`.
//! Middleware: request tracing, body size limit.

use axum::Router;
use axum::extract::Request;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Largest accepted webhook body. Upstream updates are a few KiB.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the ingress router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Query strings may carry a bot token, so only the path is recorded.
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
        )
    });

    Router::new()
        .route("/webhook", post(handlers::webhook::receive_webhook))
        .route("/webhook/", post(handlers::webhook::receive_webhook))
        .route("/webhook/{bot}", post(handlers::webhook::receive_webhook))
        .route("/health", get(health_check))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(trace)
        .with_state(state)
}

/// GET /health - Liveness probe.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
