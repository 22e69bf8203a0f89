//! Credential comparison helpers.
//!
//! Every comparison against configured token or secret material goes through
//! [`constant_time_eq`] so response timing does not reveal how many leading
//! bytes of a guess were correct.

use secrecy::{ExposeSecret, SecretString};

use botgate_types::resolution::ResolutionFailure;

/// Header the upstream API uses to authenticate webhook calls.
pub const WEBHOOK_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Compare two byte slices without short-circuiting on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Whether `candidate` equals the configured secret. Surrounding whitespace
/// on either side is ignored.
pub fn secret_matches(expected: &SecretString, candidate: &str) -> bool {
    constant_time_eq(
        expected.expose_secret().trim().as_bytes(),
        candidate.trim().as_bytes(),
    )
}

/// Check the webhook secret header against the registration's secret.
///
/// Registrations without a secret accept any request. Otherwise the header
/// must be present and equal.
pub fn verify_webhook_secret(
    expected: Option<&SecretString>,
    provided: Option<&str>,
) -> Result<(), ResolutionFailure> {
    let Some(expected) = expected.filter(|s| !s.expose_secret().trim().is_empty()) else {
        return Ok(());
    };
    match provided {
        Some(candidate) if secret_matches(expected, candidate) => Ok(()),
        _ => Err(ResolutionFailure::WebhookSecretMismatch),
    }
}
