//! Retry policy for outbound calls.
//!
//! Stateless: the policy only holds configuration, and every decision is a
//! function of the attempt number and what that attempt produced. Adapters
//! drive the loop and do the (cancellable) waiting themselves.
//!
//! Only two outcomes are retried: rate limiting and transport failures. An
//! `ok: false` envelope for any other reason means the upstream already
//! processed or rejected the call, so repeating it could duplicate a side
//! effect such as a sent message.

use std::time::Duration;

use botgate_types::config::UpstreamConfig;
use botgate_types::upstream::{OutboundCallResult, RATE_LIMITED_CODE};

/// What one attempt produced.
#[derive(Debug)]
pub enum AttemptOutcome<'a> {
    /// The upstream answered with a valid envelope.
    Answered {
        http_status: u16,
        envelope: &'a OutboundCallResult,
        /// Parsed `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },
    /// No usable answer: timeout, DNS, connection reset, unparsable body.
    TransportFailure,
}

/// What to do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Stop and return the attempt's result to the caller.
    Return,
    /// Wait this long, then try again.
    RetryAfter(Duration),
}

/// Attempt limit and backoff settings for one upstream client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    /// Attempt N (1-based) backs off `N * base_delay`.
    pub base_delay: Duration,
    /// Rate-limit waits longer than this are not honoured; the rate-limit
    /// envelope is returned instead.
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&UpstreamConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            max_retry_after: config.max_retry_after(),
        }
    }

    /// Linear backoff for a 1-based attempt number.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    pub fn is_final(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    /// Decide what follows `attempt` (1-based).
    pub fn decide(&self, attempt: u32, outcome: &AttemptOutcome<'_>) -> RetryDecision {
        match outcome {
            AttemptOutcome::TransportFailure => {
                if self.is_final(attempt) {
                    RetryDecision::Return
                } else {
                    RetryDecision::RetryAfter(self.backoff(attempt))
                }
            }
            AttemptOutcome::Answered {
                http_status,
                envelope,
                retry_after,
            } => {
                let rate_limited =
                    i64::from(*http_status) == RATE_LIMITED_CODE || envelope.is_rate_limited();
                if !rate_limited || self.is_final(attempt) {
                    return RetryDecision::Return;
                }
                let delay = retry_after
                    .or_else(|| envelope.retry_after_secs().map(Duration::from_secs))
                    .unwrap_or_else(|| self.backoff(attempt));
                if delay > self.max_retry_after {
                    RetryDecision::Return
                } else {
                    RetryDecision::RetryAfter(delay)
                }
            }
        }
    }
}
