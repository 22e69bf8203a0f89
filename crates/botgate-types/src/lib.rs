//! Shared domain types for botgate.
//!
//! This crate contains the domain types used across the gateway: bot
//! registrations, deployment environments, resolution outcomes, the upstream
//! API envelope, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, secrecy.

pub mod bot;
pub mod config;
pub mod environment;
pub mod error;
pub mod resolution;
pub mod upstream;
