//! Repository trait definitions (ports).
//!
//! The registry is the durable store of bot identities. The dispatcher only
//! reads from it; administrative writes come from the CLI. The core crate never
//! depends on any specific storage technology.

pub mod bot;
