use thiserror::Error;

use crate::resolution::ResolutionFailure;

/// Errors from repository operations (used by trait definitions in botgate-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from loading the gateway configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
}

/// Failures surfaced while handling one inbound webhook.
///
/// Not-found and isolation failures are structural and never retried;
/// upstream and transport failures come from outbound calls; handler faults
/// are anything a bot's own logic raised.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The bot, or its handler, is absent or disabled. Carries a reason code.
    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error("isolation violation: {0}")]
    IsolationViolation(ResolutionFailure),

    #[error("upstream error {code}: {description}")]
    Upstream { code: i64, description: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("handler fault: {0}")]
    HandlerFault(String),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl From<ResolutionFailure> for GatewayError {
    fn from(reason: ResolutionFailure) -> Self {
        if reason.is_not_found() {
            GatewayError::NotFound(reason.code())
        } else {
            GatewayError::IsolationViolation(reason)
        }
    }
}

impl GatewayError {
    /// HTTP status the ingress answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::BadRequest(_) => 400,
            GatewayError::IsolationViolation(_) => 403,
            GatewayError::NotFound(_) => 404,
            GatewayError::Upstream { .. }
            | GatewayError::Transport(_)
            | GatewayError::HandlerFault(_)
            | GatewayError::Storage(_) => 500,
        }
    }

    /// Stable reason code for logs.
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::BadRequest(_) => "BadRequest",
            GatewayError::NotFound(code) => code,
            GatewayError::IsolationViolation(reason) => reason.code(),
            GatewayError::Upstream { .. } => "UpstreamError",
            GatewayError::Transport(_) => "TransportError",
            GatewayError::HandlerFault(_) => "HandlerFault",
            GatewayError::Storage(_) => "StorageError",
        }
    }

    /// Message for the `{"error": ...}` response body.
    ///
    /// Internal failures collapse to a generic message; nothing here carries
    /// token material.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::BadRequest(msg) => msg.clone(),
            GatewayError::NotFound("HandlerNotFound") => "Handler not found".to_string(),
            GatewayError::NotFound(_) => "Bot not found".to_string(),
            GatewayError::IsolationViolation(reason) => {
                let text = reason.to_string();
                let mut chars = text.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => text,
                }
            }
            _ => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_disabled_bot_maps_to_not_found() {
        let err = GatewayError::from(ResolutionFailure::BotDisabled);
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.reason(), "BotDisabled");
        assert_eq!(err.public_message(), "Bot not found");
    }

    #[test]
    fn test_isolation_violation_maps_to_forbidden() {
        let err = GatewayError::from(ResolutionFailure::AmbiguousToken);
        assert_eq!(err.status_code(), 403);
        assert_eq!(
            err.public_message(),
            "Request cannot be attributed to a single environment"
        );
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let err = GatewayError::HandlerFault("token 123:ABC leaked".to_string());
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "Internal server error");
    }
}
