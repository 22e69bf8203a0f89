//! Request routing, environment resolution, and isolation enforcement for botgate.
//!
//! This crate defines the "ports" (the `BotRegistry` and `UpstreamApi` traits)
//! that the infrastructure layer implements, plus the pure logic that binds an
//! inbound webhook to exactly one environment. It depends only on
//! `botgate-types` -- never on `botgate-infra` or any database/IO crate.

pub mod auth;
pub mod dispatcher;
pub mod guard;
pub mod repository;
pub mod resolver;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_support;
