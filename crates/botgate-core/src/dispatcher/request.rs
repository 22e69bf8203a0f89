//! Transport-neutral webhook request/response shapes.

use std::collections::HashMap;

use serde_json::{Value, json};

use botgate_types::bot::{DEV_PATH_MARKER, WEBHOOK_ROUTE_PREFIX};
use botgate_types::error::GatewayError;

/// An inbound webhook call, decoupled from the HTTP framework.
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    /// Path only, without the query string.
    pub path: String,
    /// Value of the `Host` header.
    pub host: String,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Value,
}

impl WebhookRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Status and JSON body to answer the upstream with.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: Value,
}

impl WebhookResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// The generic envelope returned when a handler produced no body.
    pub fn success() -> Self {
        Self::ok(json!({ "status": "success" }))
    }

    pub fn from_error(err: &GatewayError) -> Self {
        Self {
            status: err.status_code(),
            body: json!({ "error": err.public_message() }),
        }
    }
}

/// The bot-identifying part of a webhook path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    /// Last path segment exactly as invoked.
    pub segment: String,
}

impl WebhookTarget {
    /// The segment with a trailing `dev` marker removed, if it carries one.
    pub fn without_dev_marker(&self) -> Option<&str> {
        self.segment
            .strip_suffix(DEV_PATH_MARKER)
            .filter(|name| !name.is_empty())
    }
}

/// Extract the bot segment from `/webhook/{segment}`.
///
/// Returns None when the path has no bot identifier (`/webhook`, `/webhook/`)
/// or is not under the webhook prefix.
pub fn parse_webhook_path(path: &str) -> Option<WebhookTarget> {
    let rest = path.trim().strip_prefix(WEBHOOK_ROUTE_PREFIX)?;
    let segment = rest.strip_prefix('/')?.trim_end_matches('/');
    if segment.is_empty() || segment.contains('/') {
        return None;
    }
    Some(WebhookTarget {
        segment: segment.to_string(),
    })
}
