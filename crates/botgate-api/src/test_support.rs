//! Test doubles shared by the binary's unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use botgate_core::dispatcher::HandlerContext;
use botgate_core::upstream::{ApiCall, BotApi, BoxUpstreamApi, UpstreamApi};
use botgate_infra::sqlite::pool::{DatabasePool, default_database_url};
use botgate_types::bot::BotRegistration;
use botgate_types::config::GatewayConfig;
use botgate_types::environment::Environment;
use botgate_types::upstream::OutboundCallResult;

use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub token: String,
    pub params: Map<String, Value>,
}

/// Upstream fake that records every call and answers from a reply queue
/// (`{"ok":true,"result":true}` once the queue is empty).
#[derive(Clone, Default)]
pub struct RecordingUpstream {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    replies: Arc<Mutex<VecDeque<OutboundCallResult>>>,
}

impl RecordingUpstream {
    pub fn reply_with(&self, reply: OutboundCallResult) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn boxed(&self) -> BoxUpstreamApi {
        BoxUpstreamApi::new(self.clone())
    }
}

impl UpstreamApi for RecordingUpstream {
    async fn call(&self, call: ApiCall<'_>, _cancel: &CancellationToken) -> OutboundCallResult {
        self.calls.lock().unwrap().push(RecordedCall {
            method: call.method.to_string(),
            token: call.token.expose_secret().to_string(),
            params: call.params.clone(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| OutboundCallResult::success(Value::Bool(true)))
    }

    fn file_url(&self, token: &SecretString, file_path: &str) -> String {
        format!("https://files.test/bot{}/{}", token.expose_secret(), file_path)
    }
}

/// A handler context bound to `upstream` for `bot` in `environment`.
pub fn context(
    upstream: &RecordingUpstream,
    bot: &str,
    environment: Environment,
    token: &str,
) -> HandlerContext {
    let token = SecretString::from(token);
    HandlerContext {
        registration: Arc::new(BotRegistration::new(bot)),
        environment,
        token: token.clone(),
        request_id: Uuid::now_v7(),
        api: BotApi::new(
            Arc::new(upstream.boxed()),
            bot,
            environment,
            token,
            CancellationToken::new(),
        ),
    }
}

/// A registration deployed in both environments on separate domains.
pub fn deployed(name: &str) -> BotRegistration {
    let mut reg = BotRegistration::new(name);
    reg.dev_token = Some(SecretString::from(format!("{name}-dev-token")));
    reg.prod_token = Some(SecretString::from(format!("{name}-prod-token")));
    reg.dev_domain = Some("https://dev.example.com".to_string());
    reg.prod_domain = Some("https://bots.example.com".to_string());
    reg
}

/// Application state over a fresh SQLite file and a recording upstream.
pub async fn test_state(config: GatewayConfig, upstream: &RecordingUpstream) -> AppState {
    let dir = tempfile::tempdir().unwrap();
    let pool = DatabasePool::new(&default_database_url(dir.path()))
        .await
        .unwrap();
    let data_dir = dir.path().to_path_buf();
    // Keep the directory alive for the duration of the test process.
    std::mem::forget(dir);
    AppState::from_parts(config, data_dir, pool, upstream.boxed()).unwrap()
}
