//! Request-scoped outbound handle.

use std::sync::Arc;

use secrecy::SecretString;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

use botgate_types::environment::Environment;
use botgate_types::upstream::OutboundCallResult;

use super::api::{ApiCall, BoxUpstreamApi};

/// The shared upstream client bound to one inbound request.
///
/// Carries the bot name, resolved environment, token, and the request's
/// cancellation token, so a handler can only ever call upstream with the
/// credential resolution selected for it. Cloning is cheap.
#[derive(Clone)]
pub struct BotApi {
    upstream: Arc<BoxUpstreamApi>,
    bot: Arc<str>,
    environment: Environment,
    token: SecretString,
    cancel: CancellationToken,
}

impl BotApi {
    pub fn new(
        upstream: Arc<BoxUpstreamApi>,
        bot: &str,
        environment: Environment,
        token: SecretString,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            upstream,
            bot: Arc::from(bot),
            environment,
            token,
            cancel,
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Call an upstream method. `params` must be a JSON object (or null).
    pub async fn call(&self, method: &str, params: Value) -> OutboundCallResult {
        let params = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return OutboundCallResult::failure(
                    400,
                    "Bad Request: parameters must be a JSON object",
                );
            }
        };
        let call = ApiCall {
            bot: &self.bot,
            environment: self.environment,
            method,
            token: &self.token,
            params: &params,
        };
        self.upstream.call(call, &self.cancel).await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> OutboundCallResult {
        self.call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await
    }

    pub fn file_url(&self, file_path: &str) -> String {
        self.upstream.file_url(&self.token, file_path)
    }

    /// Whether the inbound request this handle belongs to was abandoned.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for BotApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotApi")
            .field("bot", &self.bot)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}
