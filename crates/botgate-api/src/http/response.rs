//! Mapping of dispatcher responses onto HTTP.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use botgate_core::dispatcher::WebhookResponse;

/// A dispatcher outcome rendered as a JSON HTTP response.
#[derive(Debug)]
pub struct WebhookReply(pub WebhookResponse);

impl IntoResponse for WebhookReply {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.body)).into_response()
    }
}
