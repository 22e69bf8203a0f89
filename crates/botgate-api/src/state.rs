//! Application state wiring the registry, upstream client and dispatcher.
//!
//! AppState holds the concrete instances used by both the CLI and the webhook
//! ingress. The core is generic over the registry port; AppState pins it to the
//! SQLite adapter.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use botgate_core::dispatcher::WebhookDispatcher;
use botgate_core::upstream::BoxUpstreamApi;
use botgate_infra::config::{load_config_file, load_gateway_config, resolve_data_dir};
use botgate_infra::sqlite::bot::SqliteBotRegistry;
use botgate_infra::sqlite::pool::{DatabasePool, default_database_url};
use botgate_infra::telegram::TelegramClient;
use botgate_types::config::GatewayConfig;
use botgate_types::error::ConfigError;

use crate::bots::build_handler_table;

/// Concrete dispatcher pinned to the SQLite registry.
pub type ConcreteDispatcher = WebhookDispatcher<SqliteBotRegistry>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub data_dir: PathBuf,
    pub registry: Arc<SqliteBotRegistry>,
    pub upstream: Arc<BoxUpstreamApi>,
    pub dispatcher: Arc<ConcreteDispatcher>,
}

/// Configuration as loaded at startup.
pub struct LoadedConfig {
    pub data_dir: PathBuf,
    pub config: GatewayConfig,
    /// Why an implicit config file was ignored in favour of defaults.
    pub problem: Option<ConfigError>,
}

/// Resolve the data directory and load the gateway configuration.
///
/// An explicit `--config` path must exist and parse; otherwise
/// `{data_dir}/config.toml` is read leniently and any problem is returned for
/// the caller to log.
pub async fn load_config(explicit: Option<&Path>) -> anyhow::Result<LoadedConfig> {
    let data_dir = resolve_data_dir();
    let (config, problem) = match explicit {
        Some(path) => (load_config_file(path).await?, None),
        None => load_gateway_config(&data_dir).await,
    };
    Ok(LoadedConfig {
        data_dir,
        config,
        problem,
    })
}

impl AppState {
    /// Initialize the application state: open the database, build the
    /// Telegram client and the handler table.
    pub async fn init(data_dir: PathBuf, config: GatewayConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db_url = config
            .database
            .url
            .clone()
            .unwrap_or_else(|| default_database_url(&data_dir));
        let db_pool = DatabasePool::new(&db_url)
            .await
            .context("failed to open registry database")?;

        let client = TelegramClient::new(&config.upstream).context("failed to build HTTP client")?;

        Self::from_parts(config, data_dir, db_pool, BoxUpstreamApi::new(client))
    }

    /// Assemble the state from already-built parts.
    pub fn from_parts(
        config: GatewayConfig,
        data_dir: PathBuf,
        db_pool: DatabasePool,
        upstream: BoxUpstreamApi,
    ) -> anyhow::Result<Self> {
        let registry = Arc::new(SqliteBotRegistry::new(db_pool));
        let upstream = Arc::new(upstream);
        let handlers = build_handler_table(&config.handlers)?;

        let dispatcher = WebhookDispatcher::new(registry.clone(), upstream.clone(), handlers)
            .with_deadline(config.server.request_timeout());

        Ok(Self {
            config: Arc::new(config),
            data_dir,
            registry,
            upstream,
            dispatcher: Arc::new(dispatcher),
        })
    }
}
