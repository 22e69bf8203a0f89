//! In-memory fakes for the core's ports, shared by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use botgate_types::bot::{BotId, BotRegistration};
use botgate_types::environment::Environment;
use botgate_types::error::RepositoryError;
use botgate_types::upstream::OutboundCallResult;

use crate::repository::bot::{BotRegistry, RegistrationFilter};
use crate::upstream::api::{ApiCall, UpstreamApi};

#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    entries: Arc<Mutex<Vec<BotRegistration>>>,
}

impl InMemoryRegistry {
    pub fn with(entries: Vec<BotRegistration>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    fn snapshot(&self) -> Vec<BotRegistration> {
        self.entries.lock().unwrap().clone()
    }
}

impl BotRegistry for InMemoryRegistry {
    async fn find_enabled_by_name(
        &self,
        name: &str,
    ) -> Result<Option<BotRegistration>, RepositoryError> {
        Ok(self
            .snapshot()
            .into_iter()
            .find(|r| r.name == name && r.enabled))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<BotRegistration>, RepositoryError> {
        Ok(self.snapshot().into_iter().find(|r| r.name == name))
    }

    async fn find_conflicting_webhook_path(
        &self,
        path: &str,
        excluding: &BotId,
    ) -> Result<Vec<BotRegistration>, RepositoryError> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|r| r.enabled && &r.id != excluding && r.effective_webhook_path() == path)
            .collect())
    }

    async fn create(&self, registration: &BotRegistration) -> Result<BotRegistration, RepositoryError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.iter().any(|r| r.name == registration.name) {
            return Err(RepositoryError::Conflict(registration.name.clone()));
        }
        entries.push(registration.clone());
        Ok(registration.clone())
    }

    async fn list(
        &self,
        filter: Option<RegistrationFilter>,
    ) -> Result<Vec<BotRegistration>, RepositoryError> {
        let filter = filter.unwrap_or_default();
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|r| filter.enabled.is_none_or(|e| r.enabled == e))
            .collect())
    }

    async fn update(&self, registration: &BotRegistration) -> Result<BotRegistration, RepositoryError> {
        let mut entries = self.entries.lock().unwrap();
        let slot = entries
            .iter_mut()
            .find(|r| r.id == registration.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = registration.clone();
        Ok(registration.clone())
    }

    async fn delete(&self, id: &BotId) -> Result<(), RepositoryError> {
        self.entries.lock().unwrap().retain(|r| &r.id != id);
        Ok(())
    }
}

/// One call observed by [`ScriptedUpstream`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub bot: String,
    pub environment: Environment,
    pub method: String,
    pub token: String,
    pub params: Map<String, Value>,
}

/// Upstream fake that records calls and replays queued envelopes
/// (`{ok: true, result: true}` once the queue is empty).
#[derive(Clone, Default)]
pub struct ScriptedUpstream {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    replies: Arc<Mutex<VecDeque<OutboundCallResult>>>,
}

impl ScriptedUpstream {
    pub fn push_reply(&self, reply: OutboundCallResult) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl UpstreamApi for ScriptedUpstream {
    async fn call(&self, call: ApiCall<'_>, cancel: &CancellationToken) -> OutboundCallResult {
        if cancel.is_cancelled() {
            return OutboundCallResult::transport_failure("request cancelled");
        }
        self.calls.lock().unwrap().push(RecordedCall {
            bot: call.bot.to_string(),
            environment: call.environment,
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
        format!("file/{}/{}", token.expose_secret(), file_path)
    }
}
