//! Isolation guard.
//!
//! Runs after resolution and decides whether the resolved environment is safe
//! to use for this request. Checks short-circuit in a fixed order: the invoked
//! path first, then cross-environment conflicts with other registrations.
//!
//! The guard is pure. The caller loads the conflicting registrations (see
//! [`BotRegistry::find_conflicting_webhook_path`]) and passes them in.
//!
//! [`BotRegistry::find_conflicting_webhook_path`]: crate::repository::bot::BotRegistry::find_conflicting_webhook_path

use botgate_types::bot::{BotRegistration, DEV_PATH_MARKER, normalize_webhook_path};
use botgate_types::environment::Environment;
use botgate_types::resolution::ResolutionFailure;

use crate::resolver::normalize_host;

/// Run every guard check in precedence order.
pub fn check(
    registration: &BotRegistration,
    environment: Environment,
    invoked_path: &str,
    same_path_registrations: &[BotRegistration],
) -> Result<(), ResolutionFailure> {
    check_path(registration, environment, invoked_path)?;
    check_conflicts(registration, environment, same_path_registrations)
}

/// Paths the upstream may legitimately call for `environment`.
///
/// Prod accepts only the effective webhook path. Dev additionally accepts the
/// path with the `dev` marker appended.
pub fn expected_paths(registration: &BotRegistration, environment: Environment) -> Vec<String> {
    let base = registration.effective_webhook_path();
    match environment {
        Environment::Prod => vec![base],
        Environment::Dev => {
            let marked = format!("{base}{DEV_PATH_MARKER}");
            vec![base, marked]
        }
    }
}

/// Compare the invoked path against the expected path(s) for `environment`.
pub fn check_path(
    registration: &BotRegistration,
    environment: Environment,
    invoked_path: &str,
) -> Result<(), ResolutionFailure> {
    let invoked = normalize_webhook_path(invoked_path);
    if expected_paths(registration, environment)
        .iter()
        .any(|expected| *expected == invoked)
    {
        Ok(())
    } else {
        Err(ResolutionFailure::WebhookPathMismatch)
    }
}

/// Reject `environment` when another registration sharing this webhook path
/// is deployed in the opposite environment on an indistinguishable domain.
pub fn check_conflicts(
    registration: &BotRegistration,
    environment: Environment,
    same_path_registrations: &[BotRegistration],
) -> Result<(), ResolutionFailure> {
    let other_env = environment.opposite();
    let own_host = registration
        .domain_for(environment)
        .and_then(normalize_host);

    for other in same_path_registrations {
        if other.id == registration.id || !other.enabled || !other.is_deployed_in(other_env) {
            continue;
        }
        let other_host = other.domain_for(other_env).and_then(normalize_host);
        let indistinguishable = match (&own_host, &other_host) {
            (Some(own), Some(theirs)) => own == theirs,
            _ => true,
        };
        if indistinguishable {
            tracing::warn!(
                bot = %registration.name,
                environment = %environment,
                conflicting_bot = %other.name,
                "webhook path shared across environments on the same domain"
            );
            return Err(ResolutionFailure::CrossEnvironmentConflict);
        }
    }
    Ok(())
}
