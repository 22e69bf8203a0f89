//! Infrastructure layer for botgate.
//!
//! Contains implementations of the ports defined in `botgate-core`: the SQLite
//! bot registry and the Telegram Bot API client, plus configuration loading.

pub mod config;
pub mod sqlite;
pub mod telegram;
