//! Gateway configuration types.
//!
//! `GatewayConfig` represents `config.toml` in the data directory. Every
//! section and field has a default, so an empty or missing file yields a
//! runnable gateway bound to localhost.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for botgate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Bot name -> built-in handler kind (`"echo"`, `"ack"`).
    #[serde(default)]
    pub handlers: BTreeMap<String, String>,
}

/// Inbound HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Deadline for one inbound webhook, including all outbound calls it makes.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Outbound client settings for the upstream messaging API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Total attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff unit: attempt N waits `N * base_delay_ms`.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// A `Retry-After` longer than this is not waited for.
    #[serde(default = "default_max_retry_after_secs")]
    pub max_retry_after_secs: u64,

    /// Per-attempt timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_retry_after_secs: default_max_retry_after_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl UpstreamConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Registry storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL. None = `sqlite://{data_dir}/botgate.db?mode=rwc`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Emit log lines as JSON.
    #[serde(default)]
    pub json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_retry_after_secs() -> u64 {
    60
}
