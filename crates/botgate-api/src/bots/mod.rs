//! Built-in bot handlers and the startup table that binds them to bot names.
//!
//! `[handlers]` in `config.toml` maps a bot name to a handler kind:
//!
//! ```toml
//! [handlers]
//! support = "echo"
//! alerts = "ack"
//! ```

pub mod echo;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use botgate_core::dispatcher::HandlerTable;

pub use echo::{AckHandler, EchoHandler};

/// The handler implementations shipped with the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Replies to a text message with the same text.
    Echo,
    /// Acknowledges every update without calling upstream.
    Ack,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Echo => f.write_str("echo"),
            HandlerKind::Ack => f.write_str("ack"),
        }
    }
}

impl FromStr for HandlerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "echo" => Ok(HandlerKind::Echo),
            "ack" => Ok(HandlerKind::Ack),
            other => Err(format!("unknown handler kind: '{other}' (expected echo or ack)")),
        }
    }
}

/// Build the handler table from the `[handlers]` config section.
///
/// An unknown kind is a startup error rather than a silently unrouted bot.
pub fn build_handler_table(handlers: &BTreeMap<String, String>) -> anyhow::Result<HandlerTable> {
    let mut table = HandlerTable::new();
    for (bot, kind) in handlers {
        let kind: HandlerKind = kind
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .with_context(|| format!("invalid [handlers] entry for bot '{bot}'"))?;
        match kind {
            HandlerKind::Echo => table.register(bot.clone(), || EchoHandler),
            HandlerKind::Ack => table.register(bot.clone(), || AckHandler),
        }
        tracing::debug!(bot = %bot, kind = %kind, "registered handler");
    }
    Ok(table)
}
