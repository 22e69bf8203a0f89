//! HTTP ingress for botgate.
//!
//! Axum router receiving upstream webhook deliveries under `/webhook/` and a
//! health probe. All routing decisions are made by the core dispatcher.

pub mod handlers;
pub mod response;
pub mod router;
