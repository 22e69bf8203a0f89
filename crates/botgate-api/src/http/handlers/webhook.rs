//! Webhook receiver.
//!
//! Converts an axum request into a transport-neutral [`WebhookRequest`] and
//! hands it to the dispatcher. Every outcome, including routing and isolation
//! failures, comes back as a JSON body with the matching status.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Uri, header};
use serde_json::Value;

use botgate_core::dispatcher::WebhookRequest;

use crate::http::response::WebhookReply;
use crate::state::AppState;

/// POST /webhook/{bot} (also `/webhook` and `/webhook/`, answered with 400).
pub async fn receive_webhook(
    State(state): State<AppState>,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookReply {
    let request = WebhookRequest {
        path: uri.path().to_string(),
        host: request_host(&headers, &uri),
        headers: lowercase_headers(&headers),
        query,
        body: parse_body(&body),
    };

    WebhookReply(state.dispatcher.handle(request).await)
}

/// The `Host` header, or the URI authority for HTTP/2 requests.
fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

/// Header names from `http` are already lowercase. Non-UTF-8 values are dropped.
fn lowercase_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Parse the body as JSON (best-effort; empty or invalid bodies become null).
fn parse_body(body: &Bytes) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "webhook body is not valid JSON");
        Value::Null
    })
}
