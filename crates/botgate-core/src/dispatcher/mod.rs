//! Webhook dispatcher: the top-level entry point for inbound updates.
//!
//! One call to [`WebhookDispatcher::handle`] runs the whole pipeline for a
//! single request, sequentially:
//!
//! 1. parse the bot segment out of the path
//! 2. look the bot up among enabled registrations
//! 3. resolve the environment (host, then embedded token)
//! 4. run the isolation guard (path, then cross-environment conflicts)
//! 5. verify the webhook secret, if the bot has one
//! 6. instantiate the bot's handler from the handler table
//! 7. invoke it with a request-scoped context, under the inbound deadline
//!
//! Every outcome becomes a [`WebhookResponse`]; nothing escapes as a panic or
//! an unanswered request. The resolved environment lives only in the
//! [`HandlerContext`] passed down this call chain.

pub mod handler;
pub mod request;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use botgate_types::bot::{BotRegistration, mask_token};
use botgate_types::error::GatewayError;
use botgate_types::resolution::{Resolution, ResolutionFailure};

use crate::auth::{WEBHOOK_SECRET_HEADER, verify_webhook_secret};
use crate::guard;
use crate::repository::bot::BotRegistry;
use crate::resolver::{extract_embedded_token, resolve};
use crate::upstream::{BotApi, BoxUpstreamApi};

pub use handler::{BotHandler, BoxBotHandler, HandlerContext, HandlerFactory, HandlerTable};
pub use request::{WebhookRequest, WebhookResponse, WebhookTarget, parse_webhook_path};

/// Handler error text is cut to this many characters before logging.
pub const MAX_ERROR_CHARS: usize = 200;

/// Routes inbound webhooks to bot handlers.
pub struct WebhookDispatcher<R> {
    registry: Arc<R>,
    upstream: Arc<BoxUpstreamApi>,
    handlers: HandlerTable,
    deadline: Option<Duration>,
}

impl<R: BotRegistry> WebhookDispatcher<R> {
    pub fn new(registry: Arc<R>, upstream: Arc<BoxUpstreamApi>, handlers: HandlerTable) -> Self {
        Self {
            registry,
            upstream,
            handlers,
            deadline: None,
        }
    }

    /// Abandon a request (and its in-flight outbound calls) after `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    /// Handle one inbound webhook call.
    pub async fn handle(&self, request: WebhookRequest) -> WebhookResponse {
        let request_id = Uuid::now_v7();
        let span = tracing::info_span!(
            "webhook",
            %request_id,
            bot = tracing::field::Empty,
            environment = tracing::field::Empty
        );

        async {
            match self.dispatch(&request, request_id).await {
                Ok(response) => {
                    tracing::info!(status = response.status, "webhook handled");
                    response
                }
                Err(err) => {
                    let status = err.status_code();
                    match &err {
                        // Already logged with context at the invocation site.
                        GatewayError::HandlerFault(_) => {}
                        _ if status >= 500 => {
                            tracing::error!(status, reason = err.reason(), error = %err, "webhook failed");
                        }
                        _ => {
                            tracing::warn!(status, reason = err.reason(), "webhook rejected");
                        }
                    }
                    WebhookResponse::from_error(&err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(
        &self,
        request: &WebhookRequest,
        request_id: Uuid,
    ) -> Result<WebhookResponse, GatewayError> {
        let target = parse_webhook_path(&request.path)
            .ok_or_else(|| GatewayError::BadRequest("Missing bot identifier".to_string()))?;

        let registration = self
            .lookup(&target)
            .await?
            .ok_or(ResolutionFailure::BotNotFound)?;
        tracing::Span::current().record("bot", registration.name.as_str());

        let embedded = extract_embedded_token(
            request.header("authorization"),
            &request.body,
            &request.query,
        );
        let resolution = resolve(&registration, &request.host, embedded.as_deref())?;
        tracing::Span::current().record("environment", resolution.environment.as_str());

        let same_path = self
            .registry
            .find_conflicting_webhook_path(&registration.effective_webhook_path(), &registration.id)
            .await?;
        guard::check(
            &registration,
            resolution.environment,
            &request.path,
            &same_path,
        )?;

        verify_webhook_secret(
            registration.webhook_secret.as_ref(),
            request.header(WEBHOOK_SECRET_HEADER),
        )?;

        let handler = self
            .handlers
            .instantiate(&registration.name)
            .ok_or(GatewayError::NotFound("HandlerNotFound"))?;

        tracing::debug!(
            token = %mask_token(resolution.token.expose_secret()),
            "environment resolved, invoking handler"
        );
        self.invoke(handler, registration, resolution, request_id, request.body.clone())
            .await
    }

    /// Find the registration for a path segment.
    ///
    /// The full segment is tried as a name first, so a bot whose name ends in
    /// `dev` stays reachable. Only then is a trailing `dev` marker stripped.
    async fn lookup(&self, target: &WebhookTarget) -> Result<Option<BotRegistration>, GatewayError> {
        if let Some(found) = self.registry.find_enabled_by_name(&target.segment).await? {
            return Ok(Some(found));
        }
        match target.without_dev_marker() {
            Some(name) => Ok(self.registry.find_enabled_by_name(name).await?),
            None => Ok(None),
        }
    }

    async fn invoke(
        &self,
        handler: BoxBotHandler,
        registration: BotRegistration,
        resolution: Resolution,
        request_id: Uuid,
        update: Value,
    ) -> Result<WebhookResponse, GatewayError> {
        let cancel = CancellationToken::new();
        // Dropping the request (client gone, deadline) cancels outbound calls.
        let _cancel_on_drop = cancel.clone().drop_guard();

        let api = BotApi::new(
            Arc::clone(&self.upstream),
            &registration.name,
            resolution.environment,
            resolution.token.clone(),
            cancel.clone(),
        );
        let ctx = HandlerContext {
            registration: Arc::new(registration),
            environment: resolution.environment,
            token: resolution.token.clone(),
            request_id,
            api,
        };

        let run = AssertUnwindSafe(handler.handle(ctx, update)).catch_unwind();
        let outcome = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    cancel.cancel();
                    tracing::error!(
                        deadline_ms = deadline.as_millis() as u64,
                        "request deadline exceeded, outbound calls cancelled"
                    );
                    return Err(GatewayError::HandlerFault(
                        "request deadline exceeded".to_string(),
                    ));
                }
            },
            None => run.await,
        };

        let token = resolution.token.expose_secret();
        match outcome {
            Ok(Ok(Some(body))) => Ok(WebhookResponse::ok(body)),
            Ok(Ok(None)) => Ok(WebhookResponse::success()),
            Ok(Err(err)) => {
                let message = redact_error(&format!("{err:#}"), token);
                tracing::error!(error = %message, "handler failed");
                Err(GatewayError::HandlerFault(message))
            }
            Err(panic) => {
                let message = redact_error(&panic_message(panic.as_ref()), token);
                tracing::error!(error = %message, "handler panicked");
                Err(GatewayError::HandlerFault(message))
            }
        }
    }
}

/// Mask every occurrence of `token` and cut the text to [`MAX_ERROR_CHARS`].
pub fn redact_error(message: &str, token: &str) -> String {
    let redacted = if token.is_empty() {
        message.to_string()
    } else {
        message.replace(token, &mask_token(token))
    };
    if redacted.chars().count() <= MAX_ERROR_CHARS {
        return redacted;
    }
    let mut truncated: String = redacted.chars().take(MAX_ERROR_CHARS).collect();
    truncated.push_str("...");
    truncated
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use secrecy::SecretString;
    use serde_json::json;

    use botgate_types::environment::Environment;

    use crate::test_support::{InMemoryRegistry, ScriptedUpstream};

    type Seen = Arc<Mutex<Vec<(Environment, String)>>>;

    /// Records the resolved environment/token and replies through the bound api.
    struct Replying {
        seen: Seen,
    }

    impl BotHandler for Replying {
        async fn handle(&self, ctx: HandlerContext, _update: Value) -> anyhow::Result<Option<Value>> {
            self.seen
                .lock()
                .unwrap()
                .push((ctx.environment, ctx.token.expose_secret().to_string()));
            ctx.api.send_message(1, "pong").await.into_result()?;
            Ok(None)
        }
    }

    struct Failing;

    impl BotHandler for Failing {
        async fn handle(&self, ctx: HandlerContext, _update: Value) -> anyhow::Result<Option<Value>> {
            anyhow::bail!("upstream rejected {}", ctx.token.expose_secret())
        }
    }

    struct Panicking;

    impl BotHandler for Panicking {
        async fn handle(&self, _ctx: HandlerContext, _update: Value) -> anyhow::Result<Option<Value>> {
            panic!("boom")
        }
    }

    struct Stalling {
        parked: Arc<Mutex<Option<BotApi>>>,
    }

    impl BotHandler for Stalling {
        async fn handle(&self, ctx: HandlerContext, _update: Value) -> anyhow::Result<Option<Value>> {
            *self.parked.lock().unwrap() = Some(ctx.api.clone());
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Some(json!({"late": true})))
        }
    }

    struct Fixed;

    impl BotHandler for Fixed {
        async fn handle(&self, _ctx: HandlerContext, _update: Value) -> anyhow::Result<Option<Value>> {
            Ok(Some(json!({})))
        }
    }

    fn demo() -> BotRegistration {
        let mut reg = BotRegistration::new("demo");
        reg.dev_token = Some(SecretString::from("111:DEV"));
        reg.prod_token = Some(SecretString::from("123:ABC"));
        reg.dev_domain = Some("https://dev.example.com".to_string());
        reg.prod_domain = Some("https://example.com".to_string());
        reg
    }

    fn request(path: &str, host: &str) -> WebhookRequest {
        WebhookRequest {
            path: path.to_string(),
            host: host.to_string(),
            body: json!({ "update_id": 1 }),
            ..WebhookRequest::default()
        }
    }

    fn dispatcher(
        registrations: Vec<BotRegistration>,
        handlers: HandlerTable,
    ) -> (WebhookDispatcher<InMemoryRegistry>, ScriptedUpstream) {
        let upstream = ScriptedUpstream::default();
        let dispatcher = WebhookDispatcher::new(
            Arc::new(InMemoryRegistry::with(registrations)),
            Arc::new(BoxUpstreamApi::new(upstream.clone())),
            handlers,
        );
        (dispatcher, upstream)
    }

    fn replying(seen: &Seen) -> HandlerTable {
        let seen = Arc::clone(seen);
        HandlerTable::new().with("demo", move || Replying {
            seen: Arc::clone(&seen),
        })
    }

    #[tokio::test]
    async fn test_round_trip_resolves_prod() {
        let seen = Seen::default();
        let (dispatcher, upstream) = dispatcher(vec![demo()], replying(&seen));

        let response = dispatcher.handle(request("/webhook/demo", "example.com")).await;

        assert_eq!(response, WebhookResponse::success());
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[(Environment::Prod, "123:ABC".to_string())]
        );
        let calls = upstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].token, "123:ABC");
        assert_eq!(calls[0].bot, "demo");
    }

    #[tokio::test]
    async fn test_handler_body_returned_as_is() {
        let (dispatcher, _) = dispatcher(vec![demo()], HandlerTable::new().with("demo", || Fixed));
        let response = dispatcher.handle(request("/webhook/demo", "example.com")).await;
        assert_eq!(response, WebhookResponse::ok(json!({})));
    }

    #[tokio::test]
    async fn test_disabled_bot_is_not_found() {
        let mut reg = demo();
        reg.enabled = false;
        let (dispatcher, upstream) = dispatcher(vec![reg], HandlerTable::new().with("demo", || Fixed));

        let response = dispatcher.handle(request("/webhook/demo", "example.com")).await;

        assert_eq!(response.status, 404);
        assert_eq!(response.body, json!({ "error": "Bot not found" }));
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_identifier_is_bad_request() {
        let (dispatcher, _) = dispatcher(vec![demo()], HandlerTable::new());
        let response = dispatcher.handle(request("/webhook/", "example.com")).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body, json!({ "error": "Missing bot identifier" }));
    }

    #[tokio::test]
    async fn test_unknown_host_is_forbidden() {
        let (dispatcher, _) = dispatcher(vec![demo()], HandlerTable::new().with("demo", || Fixed));
        let response = dispatcher.handle(request("/webhook/demo", "attacker.test")).await;
        assert_eq!(response.status, 403);
    }

    #[tokio::test]
    async fn test_shared_domain_without_token_is_rejected() {
        let mut reg = demo();
        reg.dev_domain = reg.prod_domain.clone();
        let (dispatcher, _) = dispatcher(vec![reg], HandlerTable::new().with("demo", || Fixed));

        let response = dispatcher.handle(request("/webhook/demo", "example.com")).await;
        assert_eq!(response.status, 403);

        let mut with_token = request("/webhook/demo", "example.com");
        with_token.query.insert("token".to_string(), "111:DEV".to_string());
        let response = dispatcher.handle(with_token).await;
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_dev_marker_is_only_an_assertion() {
        let seen = Seen::default();
        let (dispatcher, _) = dispatcher(vec![demo()], replying(&seen));

        // Suffixed path on the prod host: resolution says prod, the marker disagrees.
        let response = dispatcher.handle(request("/webhook/demodev", "example.com")).await;
        assert_eq!(response.status, 403);
        assert!(seen.lock().unwrap().is_empty());

        let response = dispatcher
            .handle(request("/webhook/demodev", "dev.example.com"))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(seen.lock().unwrap()[0].0, Environment::Dev);
    }

    #[tokio::test]
    async fn test_name_ending_in_dev_is_looked_up_verbatim() {
        let mut reg = demo();
        reg.name = "webdev".to_string();
        let (dispatcher, _) = dispatcher(vec![reg], HandlerTable::new().with("webdev", || Fixed));

        let response = dispatcher.handle(request("/webhook/webdev", "example.com")).await;
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_cross_environment_conflict() {
        let mut a = demo();
        a.webhook_path = Some("/webhook/demo".to_string());
        let mut b = BotRegistration::new("other");
        b.webhook_path = Some("/webhook/demo".to_string());
        b.dev_token = Some(SecretString::from("999:B"));
        b.dev_domain = Some("https://example.com".to_string());

        let (dispatcher, _) = dispatcher(vec![a, b], HandlerTable::new().with("demo", || Fixed));
        let response = dispatcher.handle(request("/webhook/demo", "example.com")).await;

        assert_eq!(response.status, 403);
        assert_eq!(
            response.body,
            json!({ "error": "Webhook path is shared with another bot on an indistinguishable domain" })
        );
    }

    #[tokio::test]
    async fn test_webhook_secret_enforced() {
        let mut reg = demo();
        reg.webhook_secret = Some(SecretString::from("s3cret"));
        let (dispatcher, _) = dispatcher(vec![reg], HandlerTable::new().with("demo", || Fixed));

        let response = dispatcher.handle(request("/webhook/demo", "example.com")).await;
        assert_eq!(response.status, 403);

        let mut signed = request("/webhook/demo", "example.com");
        signed.headers = HashMap::from([(WEBHOOK_SECRET_HEADER.to_string(), "s3cret".to_string())]);
        let response = dispatcher.handle(signed).await;
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_handler_not_found() {
        let (dispatcher, _) = dispatcher(vec![demo()], HandlerTable::new());
        let response = dispatcher.handle(request("/webhook/demo", "example.com")).await;
        assert_eq!(response.status, 404);
        assert_eq!(response.body, json!({ "error": "Handler not found" }));
    }

    #[tokio::test]
    async fn test_handler_error_is_generic_500() {
        let (dispatcher, _) = dispatcher(vec![demo()], HandlerTable::new().with("demo", || Failing));
        let response = dispatcher.handle(request("/webhook/demo", "example.com")).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body, json!({ "error": "Internal server error" }));
        assert!(!response.body.to_string().contains("123:ABC"));
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let (dispatcher, _) = dispatcher(vec![demo()], HandlerTable::new().with("demo", || Panicking));
        let response = dispatcher.handle(request("/webhook/demo", "example.com")).await;
        assert_eq!(response.status, 500);
    }

    #[tokio::test]
    async fn test_deadline_cancels_outbound_calls() {
        let parked: Arc<Mutex<Option<BotApi>>> = Arc::default();
        let slot = Arc::clone(&parked);
        let handlers = HandlerTable::new().with("demo", move || Stalling {
            parked: Arc::clone(&slot),
        });
        let (dispatcher, _) = dispatcher(vec![demo()], handlers);
        let dispatcher = dispatcher.with_deadline(Duration::from_millis(50));

        let response = dispatcher.handle(request("/webhook/demo", "example.com")).await;

        assert_eq!(response.status, 500);
        let api = parked.lock().unwrap().clone().unwrap();
        assert!(api.is_cancelled());
    }

    #[tokio::test]
    async fn test_concurrent_requests_keep_their_environment() {
        let seen = Seen::default();
        let (dispatcher, upstream) = dispatcher(vec![demo()], replying(&seen));

        let (dev, prod) = tokio::join!(
            dispatcher.handle(request("/webhook/demo", "dev.example.com")),
            dispatcher.handle(request("/webhook/demo", "example.com")),
        );
        assert_eq!(dev.status, 200);
        assert_eq!(prod.status, 200);

        for call in upstream.calls() {
            let expected = match call.environment {
                Environment::Dev => "111:DEV",
                Environment::Prod => "123:ABC",
            };
            assert_eq!(call.token, expected);
        }
        assert_eq!(upstream.calls().len(), 2);
    }

    #[test]
    fn test_redact_error_masks_and_truncates() {
        let message = format!("failed for 123456789:SECRETTOKEN {}", "x".repeat(300));
        let redacted = redact_error(&message, "123456789:SECRETTOKEN");
        assert!(!redacted.contains("SECRETTOKEN"));
        assert!(redacted.starts_with("failed for 123456789:..."));
        assert_eq!(redacted.chars().count(), MAX_ERROR_CHARS + 3);
    }
}
