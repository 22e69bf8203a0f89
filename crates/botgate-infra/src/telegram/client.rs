//! TelegramClient -- concrete [`UpstreamApi`] implementation for the Telegram Bot API.
//!
//! Sends `POST {base_url}/bot{token}/{method}?{params}` and returns the API's
//! own `{ok, result | error_code, description}` envelope. Rate limits and
//! transport failures are retried per [`RetryPolicy`]; every other failure is
//! returned after a single attempt.
//!
//! The token is only ever exposed while building the request URL. Request
//! URLs are never logged, and transport errors are stripped of their URL
//! before they reach an envelope.

use std::error::Error as _;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use botgate_core::upstream::{ApiCall, AttemptOutcome, RetryDecision, RetryPolicy, UpstreamApi};
use botgate_types::bot::mask_token;
use botgate_types::config::UpstreamConfig;
use botgate_types::upstream::{OutboundCallResult, RATE_LIMITED_CODE};

/// Shared Telegram Bot API client. Safe to call concurrently.
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

/// What one HTTP exchange produced, before the retry decision.
enum Attempt {
    Answered {
        status: u16,
        envelope: OutboundCallResult,
        retry_after: Option<Duration>,
    },
    Failed(String),
}

impl TelegramClient {
    /// Build a client from `[upstream]` settings (per-attempt timeout included).
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            policy: RetryPolicy::from_config(config),
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn method_url(&self, token: &SecretString, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, token.expose_secret(), method)
    }

    async fn attempt(&self, url: &str, query: &[(String, String)]) -> Attempt {
        let response = match self.client.post(url).query(query).send().await {
            Ok(response) => response,
            Err(err) => return Attempt::Failed(describe(err)),
        };

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => return Attempt::Failed(describe(err)),
        };

        match serde_json::from_slice::<OutboundCallResult>(&body) {
            Ok(envelope) => Attempt::Answered {
                status,
                envelope,
                retry_after,
            },
            Err(_) if i64::from(status) == RATE_LIMITED_CODE => Attempt::Answered {
                status,
                envelope: OutboundCallResult::failure(RATE_LIMITED_CODE, "Too Many Requests"),
                retry_after,
            },
            Err(_) => Attempt::Failed(format!("invalid response (HTTP {status})")),
        }
    }
}

impl UpstreamApi for TelegramClient {
    async fn call(&self, call: ApiCall<'_>, cancel: &CancellationToken) -> OutboundCallResult {
        let url = self.method_url(call.token, call.method);
        let query = flatten_params(call.params);
        let mut attempt: u32 = 1;

        loop {
            tracing::debug!(
                bot = call.bot,
                environment = %call.environment,
                method = call.method,
                attempt,
                "calling upstream"
            );

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return cancelled(&call),
                outcome = self.attempt(&url, &query) => outcome,
            };

            let (result, decision) = match outcome {
                Attempt::Answered {
                    status,
                    envelope,
                    retry_after,
                } => {
                    let decision = self.policy.decide(
                        attempt,
                        &AttemptOutcome::Answered {
                            http_status: status,
                            envelope: &envelope,
                            retry_after,
                        },
                    );
                    (envelope, decision)
                }
                Attempt::Failed(cause) => {
                    let cause = scrub(&cause, call.token);
                    tracing::warn!(
                        bot = call.bot,
                        environment = %call.environment,
                        method = call.method,
                        attempt,
                        error = %cause,
                        "upstream transport failure"
                    );
                    let decision = self.policy.decide(attempt, &AttemptOutcome::TransportFailure);
                    (OutboundCallResult::transport_failure(cause), decision)
                }
            };

            match decision {
                RetryDecision::Return => {
                    if !result.ok {
                        tracing::warn!(
                            bot = call.bot,
                            environment = %call.environment,
                            method = call.method,
                            attempt,
                            error_code = result.error_code,
                            description = result.description.as_deref().unwrap_or_default(),
                            "upstream call failed"
                        );
                    }
                    return result;
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::info!(
                        bot = call.bot,
                        environment = %call.environment,
                        method = call.method,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        rate_limited = result.is_rate_limited(),
                        "backing off before retry"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return cancelled(&call),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
            attempt += 1;
        }
    }

    fn file_url(&self, token: &SecretString, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.base_url,
            token.expose_secret(),
            file_path.trim_start_matches('/')
        )
    }
}

/// Encode call parameters as query pairs.
///
/// Strings are sent verbatim; other values (numbers, booleans, nested objects
/// such as `reply_markup`) as their JSON text. Nulls are omitted.
pub fn flatten_params(params: &Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let encoded = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), encoded)
        })
        .collect()
}

fn cancelled(call: &ApiCall<'_>) -> OutboundCallResult {
    tracing::debug!(
        bot = call.bot,
        environment = %call.environment,
        method = call.method,
        "upstream call cancelled"
    );
    OutboundCallResult::transport_failure("request cancelled")
}

/// Error text with the request URL (and so the token) removed.
fn describe(err: reqwest::Error) -> String {
    let err = err.without_url();
    let mut message = if err.is_timeout() {
        "operation timed out".to_string()
    } else {
        err.to_string()
    };
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn scrub(message: &str, token: &SecretString) -> String {
    let token = token.expose_secret();
    if token.is_empty() {
        message.to_string()
    } else {
        message.replace(token, &mask_token(token))
    }
}
