//! The upstream messaging API's response envelope.
//!
//! Outbound calls always produce an [`OutboundCallResult`] shaped exactly like
//! the upstream's own `{ok, result | error_code, description}` envelope.
//! Transport failures are folded into the same shape with error code 500, so a
//! caller tells them apart only by code and description.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

/// Error code used for synthetic transport-failure envelopes.
pub const TRANSPORT_FAILURE_CODE: i64 = 500;

/// Error code the upstream uses for rate limiting.
pub const RATE_LIMITED_CODE: i64 = 429;

const TRANSPORT_FAILURE_PREFIX: &str = "Request failed: ";

/// Result of one outbound API call (after retries).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundCallResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ResponseParameters>,
}

/// Extra information the upstream attaches to some failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait before repeating a rate-limited request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// The group was migrated to a supergroup with this id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate_to_chat_id: Option<i64>,
}

impl OutboundCallResult {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error_code: None,
            description: None,
            parameters: None,
        }
    }

    pub fn failure(error_code: i64, description: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error_code: Some(error_code),
            description: Some(description.into()),
            parameters: None,
        }
    }

    /// Synthetic envelope for a call that never got an upstream answer.
    pub fn transport_failure(cause: impl std::fmt::Display) -> Self {
        Self::failure(
            TRANSPORT_FAILURE_CODE,
            format!("{TRANSPORT_FAILURE_PREFIX}{cause}"),
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        !self.ok && self.error_code == Some(RATE_LIMITED_CODE)
    }

    pub fn is_transport_failure(&self) -> bool {
        !self.ok
            && self.error_code == Some(TRANSPORT_FAILURE_CODE)
            && self
                .description
                .as_deref()
                .is_some_and(|d| d.starts_with(TRANSPORT_FAILURE_PREFIX))
    }

    /// The envelope's own `parameters.retry_after`, if present.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.parameters.as_ref().and_then(|p| p.retry_after)
    }

    /// Convert into a `Result` so handlers can propagate failures with `?`.
    pub fn into_result(self) -> Result<Value, GatewayError> {
        if self.ok {
            return Ok(self.result.unwrap_or(Value::Null));
        }
        let transport = self.is_transport_failure();
        let code = self.error_code.unwrap_or(TRANSPORT_FAILURE_CODE);
        let description = self.description.unwrap_or_default();
        if transport {
            Err(GatewayError::Transport(description))
        } else {
            Err(GatewayError::Upstream { code, description })
        }
    }
}
