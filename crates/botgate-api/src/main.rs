//! botgate CLI and webhook ingress entry point.
//!
//! Binary name: `botgate`
//!
//! Parses CLI arguments, loads configuration, initializes tracing, the
//! registry database and the upstream client, then dispatches to the
//! requested command or starts the ingress server.

mod bots;
mod cli;
mod http;
mod state;

#[cfg(test)]
mod test_support;

use clap::Parser;
use clap_complete::generate;

use botgate_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need config or app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "botgate", &mut std::io::stdout());
        return Ok(());
    }

    let state::LoadedConfig {
        data_dir,
        config,
        problem,
    } = state::load_config(cli.config.as_deref()).await?;

    let serving = matches!(cli.command, Commands::Serve { .. });
    init_tracing(&TracingOptions {
        default_filter: default_filter(cli.verbose, cli.quiet, serving).to_string(),
        json: config.telemetry.json,
        otel: config.telemetry.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    if let Some(problem) = problem {
        tracing::warn!(error = %problem, "ignoring config file, using defaults");
    }

    let result = run(cli, data_dir, config).await;
    shutdown_tracing();
    result
}

async fn run(
    cli: Cli,
    data_dir: std::path::PathBuf,
    config: botgate_types::config::GatewayConfig,
) -> anyhow::Result<()> {
    let state = AppState::init(data_dir, config).await?;

    match cli.command {
        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);
            serve(state, &host, port, cli.quiet).await?;
        }

        Commands::Bot { action } => {
            cli::bot::handle_bot_command(action, &state, cli.json).await?;
        }

        Commands::Webhook { action } => {
            cli::webhook::handle_webhook_command(action, &state, cli.json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Default log filter for the chosen verbosity. `RUST_LOG` overrides it.
///
/// The server logs at info by default; admin commands stay quiet unless asked.
fn default_filter(verbose: u8, quiet: bool, serving: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 if serving => "info,tower_http=info",
        0 => "warn",
        1 => "info,botgate=debug,botgate_core=debug,botgate_infra=debug",
        _ => "trace",
    }
}

async fn serve(state: AppState, host: &str, port: u16, quiet: bool) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let handlers = state.dispatcher.handlers().names().join(", ");
    tracing::info!(
        addr = %addr,
        data_dir = %state.data_dir.display(),
        handlers = %handlers,
        "webhook ingress listening"
    );

    if !quiet {
        println!(
            "  {} botgate listening on {}",
            console::style("⚡").bold(),
            console::style(format!("http://{addr}")).cyan()
        );
        println!("  {}", console::style("Press Ctrl+C to stop").dim());
    }

    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if !quiet {
        println!("\n  Server stopped.");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
