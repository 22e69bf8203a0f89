//! Telegram Bot API adapter for the core's `UpstreamApi` port.

pub mod client;

pub use client::TelegramClient;
