//! Configuration loading and representation.
//!
//! All settings come from the process environment at startup. The pipeline
//! never reads the environment itself; it receives the resolved values.

use core::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;

use replenish_replenishment::{EventSource, ReplenishmentPolicy};

use crate::pipeline::ObservabilityMode;

pub const DEFAULT_ORDER_COMMANDS_STREAM: &str = "order-commands";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreSslMode {
    Disable,
    Prefer,
    Require,
}

impl FromStr for StoreSslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" => Ok(StoreSslMode::Disable),
            "prefer" => Ok(StoreSslMode::Prefer),
            "require" => Ok(StoreSslMode::Require),
            other => Err(format!("expected disable|prefer|require, got {other}")),
        }
    }
}

/// Durable store endpoint and credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: StoreSslMode,
}

impl core::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

impl StoreConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = match self.ssl_mode {
            StoreSslMode::Disable => PgSslMode::Disable,
            StoreSslMode::Prefer => PgSslMode::Prefer,
            StoreSslMode::Require => PgSslMode::Require,
        };
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(ssl_mode)
    }
}

/// Resolved processor configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// `None` when `DB_HOST` is unset: batches run without persistence.
    pub store: Option<StoreConfig>,
    pub redis_url: Option<String>,
    pub order_commands_stream: String,
    pub source: EventSource,
    pub observability_mode: ObservabilityMode,
    pub policy: ReplenishmentPolicy,
    pub bind_addr: String,
}

impl ProcessorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let store = match get("DB_HOST") {
            None => None,
            Some(host) => Some(StoreConfig {
                host,
                port: parse_or(&get, "DB_PORT", 5432u16)?,
                user: get("DB_USER").unwrap_or_else(|| "postgres".to_string()),
                password: lookup("DB_PASSWORD").unwrap_or_default(),
                database: get("DB_NAME").unwrap_or_else(|| "postgres".to_string()),
                ssl_mode: parse_or(&get, "DB_SSLMODE", StoreSslMode::Require)?,
            }),
        };

        let defaults = ReplenishmentPolicy::default();
        let policy = ReplenishmentPolicy::new(
            parse_or(&get, "CRITICAL_THRESHOLD_DAYS", defaults.critical_threshold_days)?,
            parse_or(&get, "URGENT_THRESHOLD_DAYS", defaults.urgent_threshold_days)?,
            parse_or(&get, "RESTOCK_TARGET_DAYS", defaults.restock_target_days)?,
        )
        .map_err(|e| ConfigError::invalid("policy", e.to_string()))?;

        Ok(Self {
            store,
            redis_url: get("REDIS_URL"),
            order_commands_stream: get("ORDER_COMMANDS_STREAM")
                .unwrap_or_else(|| DEFAULT_ORDER_COMMANDS_STREAM.to_string()),
            source: parse_or(&get, "EVENT_SOURCE", EventSource::Serverless)?,
            observability_mode: parse_or(&get, "OBSERVABILITY_MODE", ObservabilityMode::RecordFailures)?,
            policy,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(key, format!("{raw:?}: {e}"))),
    }
}
