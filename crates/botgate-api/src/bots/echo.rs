//! `echo` and `ack` handlers.

use serde_json::{Value, json};

use botgate_core::dispatcher::{BotHandler, HandlerContext};
use botgate_types::error::GatewayError;

/// Sends the text of an incoming message back to the chat it came from.
///
/// Updates without a text message are acknowledged untouched. Upstream
/// rejections are logged and acknowledged (redelivery would not help); a
/// transport failure fails the request so the upstream retries delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl BotHandler for EchoHandler {
    async fn handle(&self, ctx: HandlerContext, update: Value) -> anyhow::Result<Option<Value>> {
        let Some((chat_id, text)) = text_message(&update) else {
            tracing::debug!(bot = %ctx.registration.name, "update has no text message, skipping");
            return Ok(Some(json!({})));
        };

        match ctx.api.send_message(chat_id, text).await.into_result() {
            Ok(_) => {
                tracing::debug!(
                    bot = %ctx.registration.name,
                    environment = %ctx.environment,
                    chat_id,
                    "echoed message"
                );
            }
            Err(GatewayError::Transport(description)) => {
                anyhow::bail!("sendMessage failed: {description}");
            }
            Err(e) => {
                tracing::warn!(
                    bot = %ctx.registration.name,
                    environment = %ctx.environment,
                    chat_id,
                    error = %e,
                    "sendMessage rejected by upstream"
                );
            }
        }

        Ok(Some(json!({})))
    }
}

/// Acknowledges every update with `{}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AckHandler;

impl BotHandler for AckHandler {
    async fn handle(&self, _ctx: HandlerContext, _update: Value) -> anyhow::Result<Option<Value>> {
        Ok(Some(json!({})))
    }
}

/// `(message.chat.id, message.text)` of a text message update.
fn text_message(update: &Value) -> Option<(i64, &str)> {
    let message = update.get("message")?;
    let chat_id = message.get("chat")?.get("id")?.as_i64()?;
    let text = message.get("text")?.as_str()?;
    Some((chat_id, text))
}
