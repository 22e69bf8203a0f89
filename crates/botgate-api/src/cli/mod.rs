//! CLI command definitions for the `botgate` binary.
//!
//! Uses clap derive macros for argument parsing. Administration commands
//! follow a noun-verb pattern (e.g., `botgate bot add`, `botgate webhook set`).

pub mod bot;
pub mod webhook;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Multi-tenant webhook gateway for Telegram bots.
#[derive(Parser)]
#[command(name = "botgate", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (default: {data_dir}/config.toml).
    #[arg(long, global = true, env = "BOTGATE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the webhook ingress server.
    Serve {
        /// Port to listen on (default: [server] port).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (default: [server] host).
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage bot registrations (add, list, show, update, enable, disable, remove, check).
    Bot {
        #[command(subcommand)]
        action: bot::BotCommand,
    },

    /// Register or remove a bot's webhook with the upstream API.
    Webhook {
        #[command(subcommand)]
        action: webhook::WebhookCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
