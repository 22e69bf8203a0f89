//! Environment resolution.
//!
//! Binds an inbound request to exactly one of {dev, prod} for a registration,
//! using the request host first and, only when both environments share one
//! domain, an identifying token embedded in the request. Anything that cannot
//! be attributed to a single environment is rejected rather than guessed.
//!
//! A `dev` path suffix is never consulted here. It is checked afterwards by
//! the isolation guard as an assertion about the already-resolved environment.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use botgate_types::bot::BotRegistration;
use botgate_types::environment::Environment;
use botgate_types::resolution::{Resolution, ResolutionFailure};

use crate::auth::secret_matches;

/// Body field that may carry an identifying token.
pub const BODY_TOKEN_FIELD: &str = "bot_token";

/// Query parameter that may carry an identifying token.
pub const QUERY_TOKEN_PARAM: &str = "token";

/// Resolve which environment applies to a request.
///
/// `request_host` may be a bare host or a full URL; `embedded_token` is the
/// identifying token found in the request, if any (see
/// [`extract_embedded_token`]).
pub fn resolve(
    registration: &BotRegistration,
    request_host: &str,
    embedded_token: Option<&str>,
) -> Result<Resolution, ResolutionFailure> {
    if !registration.enabled {
        return Err(ResolutionFailure::BotDisabled);
    }

    let request_host = normalize_host(request_host);
    let host_of = |env| registration.domain_for(env).and_then(normalize_host);
    let matches = |host: Option<String>| request_host.is_some() && host == request_host;

    let dev_match = matches(host_of(Environment::Dev));
    let prod_match = matches(host_of(Environment::Prod));

    let environment = match (dev_match, prod_match) {
        (false, false) => return Err(ResolutionFailure::DomainMismatch),
        (true, false) => Environment::Dev,
        (false, true) => Environment::Prod,
        (true, true) => resolve_shared_domain(registration, embedded_token)?,
    };

    let token = registration
        .token_for(environment)
        .map(|t| SecretString::from(t.expose_secret().trim()))
        .ok_or(ResolutionFailure::TokenMissingForEnvironment)?;
    let domain = registration
        .domain_for(environment)
        .ok_or(ResolutionFailure::DomainMismatch)?
        .to_string();

    Ok(Resolution {
        environment,
        token,
        domain,
    })
}

/// Both environments answer on the same host: only a token can tell them apart.
fn resolve_shared_domain(
    registration: &BotRegistration,
    embedded_token: Option<&str>,
) -> Result<Environment, ResolutionFailure> {
    let dev = registration.token_for(Environment::Dev);
    let prod = registration.token_for(Environment::Prod);

    match embedded_token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(candidate) => {
            let dev_hit = dev.is_some_and(|t| secret_matches(t, candidate));
            let prod_hit = prod.is_some_and(|t| secret_matches(t, candidate));
            match (dev_hit, prod_hit) {
                (true, false) => Ok(Environment::Dev),
                (false, true) => Ok(Environment::Prod),
                // Unknown token, or one credential shared by both environments.
                _ => Err(ResolutionFailure::AmbiguousToken),
            }
        }
        None => match (dev.is_some(), prod.is_some()) {
            (true, true) => Err(ResolutionFailure::AmbiguousToken),
            (true, false) => Ok(Environment::Dev),
            (false, true) => Ok(Environment::Prod),
            (false, false) => Err(ResolutionFailure::TokenMissingForEnvironment),
        },
    }
}

/// Find an identifying token in the request.
///
/// Sources in priority order: the `Authorization` header (`Bearer <token>` or
/// a bare value), the top-level `bot_token` body field, the `token` query
/// parameter. Empty values count as absent.
pub fn extract_embedded_token(
    authorization: Option<&str>,
    body: &Value,
    query: &HashMap<String, String>,
) -> Option<String> {
    let from_header = authorization.map(strip_bearer);
    let from_body = body.get(BODY_TOKEN_FIELD).and_then(Value::as_str);
    let from_query = query.get(QUERY_TOKEN_PARAM).map(String::as_str);

    [from_header, from_body, from_query]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// Drop a case-insensitive `Bearer` scheme. A scheme with no credential yields "".
fn strip_bearer(value: &str) -> &str {
    let value = value.trim();
    match value.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        None if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    }
}

/// Reduce a domain or host header to a comparable host.
///
/// Case-insensitive; drops scheme, userinfo, path, query, a trailing dot, and
/// the default ports 80/443. Returns None for an empty host.
///
/// ```
/// use botgate_core::resolver::normalize_host;
///
/// assert_eq!(normalize_host("https://Example.COM/").as_deref(), Some("example.com"));
/// assert_eq!(normalize_host("example.com.:443").as_deref(), Some("example.com"));
/// assert_eq!(normalize_host("localhost:8080").as_deref(), Some("localhost:8080"));
/// ```
pub fn normalize_host(input: &str) -> Option<String> {
    let mut host = input.trim().to_ascii_lowercase();
    if let Some((_, rest)) = host.split_once("://") {
        host = rest.to_string();
    }
    if let Some(end) = host.find(['/', '?', '#']) {
        host.truncate(end);
    }
    if let Some(at) = host.rfind('@') {
        host = host[at + 1..].to_string();
    }
    for port in [":80", ":443"] {
        if let Some(stripped) = host.strip_suffix(port) {
            host = stripped.to_string();
            break;
        }
    }
    let host = host.trim_end_matches('.');
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Whether two domains resolve to the same host. Empty domains never match.
pub fn same_host(a: &str, b: &str) -> bool {
    match (normalize_host(a), normalize_host(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::{ExposeSecret, SecretString};
    use serde_json::json;

    fn split_domains() -> BotRegistration {
        let mut reg = BotRegistration::new("demo");
        reg.dev_token = Some(SecretString::from("111:DEV"));
        reg.prod_token = Some(SecretString::from("222:PROD"));
        reg.dev_domain = Some("https://dev.example.com".to_string());
        reg.prod_domain = Some("https://example.com".to_string());
        reg
    }

    fn shared_domain() -> BotRegistration {
        let mut reg = split_domains();
        reg.dev_domain = Some("https://example.com".to_string());
        reg
    }

    #[test]
    fn test_resolves_by_host_when_domains_differ() {
        let reg = split_domains();

        let dev = resolve(&reg, "dev.example.com", None).unwrap();
        assert_eq!(dev.environment, Environment::Dev);
        assert_eq!(dev.token.expose_secret(), "111:DEV");

        let prod = resolve(&reg, "example.com", None).unwrap();
        assert_eq!(prod.environment, Environment::Prod);
        assert_eq!(prod.domain, "https://example.com");
    }

    #[test]
    fn test_host_match_ignores_embedded_token() {
        let reg = split_domains();
        let res = resolve(&reg, "example.com", Some("111:DEV")).unwrap();
        assert_eq!(res.environment, Environment::Prod);
    }

    #[test]
    fn test_unknown_host_is_domain_mismatch() {
        let reg = split_domains();
        assert_eq!(
            resolve(&reg, "evil.example.org", None).unwrap_err(),
            ResolutionFailure::DomainMismatch
        );
    }

    #[test]
    fn test_no_domains_is_always_domain_mismatch() {
        let mut reg = BotRegistration::new("demo");
        reg.prod_token = Some(SecretString::from("222:PROD"));
        assert_eq!(
            resolve(&reg, "example.com", Some("222:PROD")).unwrap_err(),
            ResolutionFailure::DomainMismatch
        );
        assert_eq!(
            resolve(&reg, "", None).unwrap_err(),
            ResolutionFailure::DomainMismatch
        );
    }

    #[test]
    fn test_disabled_checked_first() {
        let mut reg = split_domains();
        reg.enabled = false;
        assert_eq!(
            resolve(&reg, "example.com", None).unwrap_err(),
            ResolutionFailure::BotDisabled
        );
    }

    #[test]
    fn test_shared_domain_without_token_is_ambiguous() {
        let reg = shared_domain();
        assert_eq!(
            resolve(&reg, "example.com", None).unwrap_err(),
            ResolutionFailure::AmbiguousToken
        );
    }

    #[test]
    fn test_shared_domain_resolves_by_token() {
        let reg = shared_domain();
        let res = resolve(&reg, "example.com", Some("111:DEV")).unwrap();
        assert_eq!(res.environment, Environment::Dev);
        let res = resolve(&reg, "example.com", Some("222:PROD")).unwrap();
        assert_eq!(res.environment, Environment::Prod);
    }

    #[test]
    fn test_shared_domain_unknown_token_is_ambiguous() {
        let reg = shared_domain();
        assert_eq!(
            resolve(&reg, "example.com", Some("333:OTHER")).unwrap_err(),
            ResolutionFailure::AmbiguousToken
        );
    }

    #[test]
    fn test_shared_credential_is_ambiguous() {
        let mut reg = shared_domain();
        reg.prod_token = Some(SecretString::from("111:DEV"));
        assert_eq!(
            resolve(&reg, "example.com", Some("111:DEV")).unwrap_err(),
            ResolutionFailure::AmbiguousToken
        );
    }

    #[test]
    fn test_single_credential_shortcut() {
        let mut reg = shared_domain();
        reg.prod_token = None;
        let res = resolve(&reg, "example.com", None).unwrap();
        assert_eq!(res.environment, Environment::Dev);
        assert_eq!(res.token.expose_secret(), "111:DEV");
    }

    #[test]
    fn test_dev_only_deployment_resolves() {
        let mut reg = BotRegistration::new("solo");
        reg.dev_token = Some(SecretString::from("111:DEV"));
        reg.dev_domain = Some("https://dev.example.com".to_string());
        let res = resolve(&reg, "https://dev.example.com", None).unwrap();
        assert_eq!(res.environment, Environment::Dev);
    }

    #[test]
    fn test_matched_environment_without_token() {
        let mut reg = split_domains();
        reg.prod_token = None;
        assert_eq!(
            resolve(&reg, "example.com", None).unwrap_err(),
            ResolutionFailure::TokenMissingForEnvironment
        );
    }

    #[test]
    fn test_shared_domain_with_no_tokens() {
        let mut reg = shared_domain();
        reg.dev_token = None;
        reg.prod_token = None;
        assert_eq!(
            resolve(&reg, "example.com", None).unwrap_err(),
            ResolutionFailure::TokenMissingForEnvironment
        );
    }

    #[test]
    fn test_round_trip_demo_bot() {
        let mut reg = BotRegistration::new("demo");
        reg.prod_token = Some(SecretString::from("123:ABC"));
        reg.prod_domain = Some("https://example.com".to_string());
        let res = resolve(&reg, "example.com", None).unwrap();
        assert_eq!(res.environment, Environment::Prod);
        assert_eq!(res.token.expose_secret(), "123:ABC");
    }

    #[test]
    fn test_normalize_host_variants() {
        assert_eq!(normalize_host("EXAMPLE.com").as_deref(), Some("example.com"));
        assert_eq!(
            normalize_host("http://user:pw@example.com:80/path?q=1").as_deref(),
            Some("example.com")
        );
        assert_eq!(normalize_host("  ").as_deref(), None);
        assert!(same_host("https://example.com", "example.com:443"));
        assert!(!same_host("", ""));
    }

    #[test]
    fn test_extract_token_priority() {
        let body = json!({ "bot_token": "body-token" });
        let mut query = HashMap::new();
        query.insert("token".to_string(), "query-token".to_string());

        assert_eq!(
            extract_embedded_token(Some("Bearer header-token"), &body, &query).as_deref(),
            Some("header-token")
        );
        assert_eq!(
            extract_embedded_token(None, &body, &query).as_deref(),
            Some("body-token")
        );
        assert_eq!(
            extract_embedded_token(Some("  "), &json!({}), &query).as_deref(),
            Some("query-token")
        );
        assert_eq!(extract_embedded_token(None, &json!([]), &HashMap::new()), None);

        // A scheme without a credential is empty, not a token.
        for header in ["Bearer ", "bearer", "  BEARER  "] {
            assert_eq!(
                extract_embedded_token(Some(header), &json!({}), &query).as_deref(),
                Some("query-token"),
                "{header:?}"
            );
        }
    }

    #[test]
    fn test_empty_bearer_falls_through_to_query_on_shared_domain() {
        let reg = shared_domain();
        let mut query = HashMap::new();
        query.insert("token".to_string(), "111:DEV".to_string());

        let token = extract_embedded_token(Some("Bearer "), &Value::Null, &query);
        let res = resolve(&reg, "example.com", token.as_deref()).unwrap();
        assert_eq!(res.environment, Environment::Dev);
    }

    #[test]
    fn test_stored_token_whitespace_is_ignored() {
        let mut reg = shared_domain();
        reg.dev_token = Some(SecretString::from(" 111:DEV\n"));

        let res = resolve(&reg, "example.com", Some("111:DEV")).unwrap();
        assert_eq!(res.environment, Environment::Dev);
        assert_eq!(res.token.expose_secret(), "111:DEV");
    }

    #[test]
    fn test_extract_token_bare_header() {
        assert_eq!(
            extract_embedded_token(Some("222:PROD"), &Value::Null, &HashMap::new()).as_deref(),
            Some("222:PROD")
        );
    }
}
