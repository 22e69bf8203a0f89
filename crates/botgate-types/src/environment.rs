//! Deployment environments a single bot identity can run under.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// A named deployment context for one bot identity, with its own credential
/// and domain.
///
/// The active environment is always a request-scoped value: it is produced by
/// resolution and passed explicitly to handlers and outbound calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

impl Environment {
    /// Both environments, dev first.
    pub const ALL: [Environment; 2] = [Environment::Dev, Environment::Prod];

    /// The other environment.
    pub fn opposite(self) -> Self {
        match self {
            Environment::Dev => Environment::Prod,
            Environment::Prod => Environment::Dev,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(format!("invalid environment: '{other}'")),
        }
    }
}
