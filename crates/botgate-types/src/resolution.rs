//! Outcome of resolving an inbound webhook to one environment.

use secrecy::SecretString;
use serde::Serialize;
use thiserror::Error;

use crate::environment::Environment;

/// A successful resolution: the environment that applies to the request and
/// the credential/domain that belong to it.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub environment: Environment,
    pub token: SecretString,
    pub domain: String,
}

/// Why a request could not be bound to an environment.
///
/// Display strings are safe to return to the caller: they never contain
/// token material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
pub enum ResolutionFailure {
    #[error("bot not found")]
    BotNotFound,

    #[error("bot is disabled")]
    BotDisabled,

    #[error("request domain does not match any configured environment")]
    DomainMismatch,

    #[error("no credential configured for the resolved environment")]
    TokenMissingForEnvironment,

    #[error("request cannot be attributed to a single environment")]
    AmbiguousToken,

    #[error("invoked path does not match the expected webhook path")]
    WebhookPathMismatch,

    #[error("webhook path is shared with another bot on an indistinguishable domain")]
    CrossEnvironmentConflict,

    #[error("webhook secret token missing or invalid")]
    WebhookSecretMismatch,
}

impl ResolutionFailure {
    /// Stable machine-readable reason, used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            ResolutionFailure::BotNotFound => "BotNotFound",
            ResolutionFailure::BotDisabled => "BotDisabled",
            ResolutionFailure::DomainMismatch => "DomainMismatch",
            ResolutionFailure::TokenMissingForEnvironment => "TokenMissingForEnvironment",
            ResolutionFailure::AmbiguousToken => "AmbiguousToken",
            ResolutionFailure::WebhookPathMismatch => "WebhookPathMismatch",
            ResolutionFailure::CrossEnvironmentConflict => "CrossEnvironmentConflict",
            ResolutionFailure::WebhookSecretMismatch => "WebhookSecretMismatch",
        }
    }

    /// Not-found class failures (the bot is absent or invisible), as opposed
    /// to isolation violations.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ResolutionFailure::BotNotFound | ResolutionFailure::BotDisabled
        )
    }
}
