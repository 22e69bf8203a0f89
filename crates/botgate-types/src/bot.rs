use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::environment::Environment;

/// Route prefix every inbound webhook is served under.
pub const WEBHOOK_ROUTE_PREFIX: &str = "/webhook";

/// Path suffix asserting the dev environment (`/webhook/{name}dev`).
pub const DEV_PATH_MARKER: &str = "dev";

/// Unique identifier for a bot registration, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BotId(pub Uuid);

impl BotId {
    /// Create a new BotId using UUID v7 (time-sortable, guaranteed ordering).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create a BotId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for BotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BotId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A bot identity registered with the gateway.
///
/// One registration covers both deployments of a bot. Each environment has
/// its own credential and domain; either side may be left unset (a bot may
/// legitimately exist only as a dev deployment).
///
/// Tokens and the webhook secret are [`SecretString`]s, so `Debug` output of a
/// registration never contains credential material.
#[derive(Debug, Clone)]
pub struct BotRegistration {
    pub id: BotId,
    /// Unique slug; derives the default webhook path and the handler binding.
    pub name: String,
    pub dev_token: Option<SecretString>,
    pub prod_token: Option<SecretString>,
    /// Scheme + host the dev deployment is reachable under.
    pub dev_domain: Option<String>,
    /// Scheme + host the prod deployment is reachable under.
    pub prod_domain: Option<String>,
    /// Path the upstream service is configured to call (None = `/webhook/{name}`).
    pub webhook_path: Option<String>,
    /// Shared secret the upstream sends with every webhook call.
    pub webhook_secret: Option<SecretString>,
    /// Disabled registrations are invisible to the dispatcher.
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BotRegistration {
    /// Create an enabled registration with no credentials configured.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: BotId::new(),
            name: name.into(),
            dev_token: None,
            prod_token: None,
            dev_domain: None,
            prod_domain: None,
            webhook_path: None,
            webhook_secret: None,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// The credential for `env`, if one is configured. Blank tokens count as unset.
    pub fn token_for(&self, env: Environment) -> Option<&SecretString> {
        let token = match env {
            Environment::Dev => self.dev_token.as_ref(),
            Environment::Prod => self.prod_token.as_ref(),
        };
        token.filter(|t| !t.expose_secret().trim().is_empty())
    }

    /// The domain for `env`, if one is configured. Blank domains count as unset.
    pub fn domain_for(&self, env: Environment) -> Option<&str> {
        let domain = match env {
            Environment::Dev => self.dev_domain.as_deref(),
            Environment::Prod => self.prod_domain.as_deref(),
        };
        domain.map(str::trim).filter(|d| !d.is_empty())
    }

    pub fn has_token_for(&self, env: Environment) -> bool {
        self.token_for(env).is_some()
    }

    /// Whether `env` has both a credential and a domain.
    pub fn is_deployed_in(&self, env: Environment) -> bool {
        self.has_token_for(env) && self.domain_for(env).is_some()
    }

    /// `/webhook/{name}`.
    pub fn default_webhook_path(&self) -> String {
        format!("{WEBHOOK_ROUTE_PREFIX}/{}", self.name)
    }

    /// The stored webhook path (path component only), or the default one.
    pub fn effective_webhook_path(&self) -> String {
        self.webhook_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(normalize_webhook_path)
            .unwrap_or_else(|| self.default_webhook_path())
    }

    /// `{domain}/webhook/{name}` for `env`, or None when `env` has no domain.
    pub fn expected_webhook_url(&self, env: Environment) -> Option<String> {
        self.domain_for(env).map(|domain| {
            format!(
                "{}{}",
                domain.trim_end_matches('/'),
                self.effective_webhook_path()
            )
        })
    }
}

/// Reduce a webhook path or URL to a normalized path component.
///
/// Strips any scheme/host and query string, ensures a leading `/` and removes
/// a trailing one (unless root).
///
/// ```
/// use botgate_types::bot::normalize_webhook_path;
///
/// assert_eq!(normalize_webhook_path("https://example.com/webhook/demo/"), "/webhook/demo");
/// assert_eq!(normalize_webhook_path("webhook/demo?x=1"), "/webhook/demo");
/// ```
pub fn normalize_webhook_path(path: &str) -> String {
    let path = path.trim();
    let path = match path.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or("/"),
        None => path,
    };
    let path = path.split(['?', '#']).next().unwrap_or_default();

    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Mask a token for log output: the first 10 characters followed by `...`.
///
/// ```
/// use botgate_types::bot::mask_token;
///
/// assert_eq!(mask_token("123456789:ABCDEFGH"), "123456789:...");
/// assert_eq!(mask_token("short"), "short...");
/// ```
pub fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(10).collect();
    format!("{prefix}...")
}

/// Generate a URL-safe slug from a display name.
///
/// Rules:
/// - Lowercase
/// - Replace non-alphanumeric characters with hyphens
/// - Collapse consecutive hyphens into one
/// - Trim leading/trailing hyphens
///
/// # Examples
///
/// ```
/// use botgate_types::bot::slugify;
///
/// assert_eq!(slugify("Support Bot"), "support-bot");
/// assert_eq!(slugify("My  Cool  Bot!"), "my-cool-bot");
/// assert_eq!(slugify("---hello---world---"), "hello-world");
/// ```
pub fn slugify(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut prev_was_hyphen = true; // treat start as hyphen to trim leading
    for c in name.to_lowercase().chars() {
        if c.is_alphanumeric() {
            result.push(c);
            prev_was_hyphen = false;
        } else if !prev_was_hyphen {
            result.push('-');
            prev_was_hyphen = true;
        }
    }

    if result.ends_with('-') {
        result.pop();
    }

    result
}
