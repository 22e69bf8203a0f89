//! Bot handler trait and the startup-built handler table.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use secrecy::SecretString;
use serde_json::Value;
use uuid::Uuid;

use botgate_types::bot::BotRegistration;
use botgate_types::environment::Environment;

use crate::upstream::bot_api::BotApi;

/// Everything a handler needs about the request it is serving.
///
/// The environment and token are the ones resolution selected; `api` is bound
/// to the same pair, so a handler never chooses a credential itself.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub registration: Arc<BotRegistration>,
    pub environment: Environment,
    pub token: SecretString,
    pub request_id: Uuid,
    pub api: BotApi,
}

/// A bot's own logic for one inbound update.
///
/// `Ok(Some(body))` is returned to the upstream as-is, `Ok(None)` becomes the
/// generic success envelope, and `Err` becomes a generic 500.
pub trait BotHandler: Send + Sync {
    fn handle(
        &self,
        ctx: HandlerContext,
        update: Value,
    ) -> impl Future<Output = anyhow::Result<Option<Value>>> + Send;
}

/// Object-safe version of [`BotHandler`] with boxed futures.
pub trait BotHandlerDyn: Send + Sync {
    fn handle_boxed<'a>(
        &'a self,
        ctx: HandlerContext,
        update: Value,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Value>>> + Send + 'a>>;
}

impl<T: BotHandler> BotHandlerDyn for T {
    fn handle_boxed<'a>(
        &'a self,
        ctx: HandlerContext,
        update: Value,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Value>>> + Send + 'a>> {
        Box::pin(self.handle(ctx, update))
    }
}

/// Type-erased handler instance.
pub struct BoxBotHandler {
    inner: Box<dyn BotHandlerDyn + Send + Sync>,
}

impl BoxBotHandler {
    pub fn new<T: BotHandler + 'static>(handler: T) -> Self {
        Self {
            inner: Box::new(handler),
        }
    }

    pub async fn handle(&self, ctx: HandlerContext, update: Value) -> anyhow::Result<Option<Value>> {
        self.inner.handle_boxed(ctx, update).await
    }
}

/// Constructs a fresh handler instance for one request.
pub type HandlerFactory = Arc<dyn Fn() -> BoxBotHandler + Send + Sync>;

/// Bot name -> handler factory, built once at startup.
#[derive(Clone, Default)]
pub struct HandlerTable {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `bot` to a factory. A later registration for the same name wins.
    pub fn register<H, F>(&mut self, bot: impl Into<String>, factory: F)
    where
        H: BotHandler + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.factories
            .insert(bot.into(), Arc::new(move || BoxBotHandler::new(factory())));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<H, F>(mut self, bot: impl Into<String>, factory: F) -> Self
    where
        H: BotHandler + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.register(bot, factory);
        self
    }

    /// Instantiate the handler bound to `bot`, if any.
    pub fn instantiate(&self, bot: &str) -> Option<BoxBotHandler> {
        self.factories.get(bot).map(|factory| factory())
    }

    pub fn contains(&self, bot: &str) -> bool {
        self.factories.contains_key(bot)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered bot names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerTable")
            .field("bots", &self.names())
            .finish()
    }
}
