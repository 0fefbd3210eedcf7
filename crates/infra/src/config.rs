//! Configuration loading from environment variables.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime configuration for the Postgres ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Upper bound on waiting for a record lock. `None` waits indefinitely.
    pub lock_timeout: Option<Duration>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            lock_timeout: None,
        }
    }
}

impl LedgerConfig {
    /// Read configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DATABASE_URL` | unset (required to connect) |
    /// | `DATABASE_MAX_CONNECTIONS` | `10` |
    /// | `INVENTORY_LOCK_TIMEOUT_MS` | unset (no timeout) |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    key: "DATABASE_MAX_CONNECTIONS",
                    value: raw,
                })?,
        };

        let lock_timeout = match get("INVENTORY_LOCK_TIMEOUT_MS") {
            None => None,
            Some(raw) => Some(
                raw.parse::<u64>()
                    .ok()
                    .filter(|ms| *ms > 0)
                    .map(Duration::from_millis)
                    .ok_or(ConfigError::Invalid {
                        key: "INVENTORY_LOCK_TIMEOUT_MS",
                        value: raw,
                    })?,
            ),
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            max_connections,
            lock_timeout,
        })
    }
}
