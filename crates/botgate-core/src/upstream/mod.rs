//! Outbound calls to the upstream messaging API.
//!
//! - `api`: the [`UpstreamApi`] port and its type-erased [`BoxUpstreamApi`] wrapper
//! - `retry`: the attempt/backoff policy shared by every adapter
//! - `bot_api`: [`BotApi`], the request-scoped handle given to bot handlers

pub mod api;
pub mod bot_api;
pub mod retry;

pub use api::{ApiCall, BoxUpstreamApi, UpstreamApi, UpstreamApiDyn};
pub use bot_api::BotApi;
pub use retry::{AttemptOutcome, RetryDecision, RetryPolicy};
