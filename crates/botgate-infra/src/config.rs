//! Gateway configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.botgate/` by default) and
//! deserializes it into [`GatewayConfig`]. An implicitly located file falls
//! back to defaults when missing or malformed; a file named explicitly on the
//! command line must exist and parse.

use std::path::{Path, PathBuf};

use botgate_types::config::GatewayConfig;
use botgate_types::error::ConfigError;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "BOTGATE_DATA_DIR";

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `BOTGATE_DATA_DIR` environment variable
/// 2. `~/.botgate`
/// 3. `./.botgate`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".botgate");
    }

    PathBuf::from(".botgate")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`GatewayConfig::default()`].
/// - If the file exists but fails to read or parse, returns the default along
///   with the problem, so the caller can report it once logging is up.
pub async fn load_gateway_config(data_dir: &Path) -> (GatewayConfig, Option<ConfigError>) {
    let config_path = data_dir.join(CONFIG_FILE_NAME);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return (GatewayConfig::default(), None);
        }
        Err(err) => {
            let problem = ConfigError::Read {
                path: config_path.display().to_string(),
                message: err.to_string(),
            };
            return (GatewayConfig::default(), Some(problem));
        }
    };

    match toml::from_str::<GatewayConfig>(&content) {
        Ok(config) => (config, None),
        Err(err) => {
            let problem = ConfigError::Parse {
                path: config_path.display().to_string(),
                message: err.to_string(),
            };
            (GatewayConfig::default(), Some(problem))
        }
    }
}

/// Load configuration from an explicitly named file. Any failure is an error.
pub async fn load_config_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
