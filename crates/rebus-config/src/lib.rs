// ============================================================================
// Rebus Config - Centralized configuration management
// ============================================================================
//
// Configuration for the rebus transport and its tooling.
// Loaded from environment variables (and an optional .env file) with
// sensible defaults.
//
// ============================================================================

mod constants;
mod redis;

pub use redis::RedisConfig;

use anyhow::Result;
use constants::*;
use std::time::Duration;

/// Main configuration structure for a rebus endpoint
#[derive(Clone, Debug)]
pub struct Config {
    pub redis: RedisConfig,

    /// Queue this endpoint receives from
    pub input_queue: String,

    /// TTL of the liveness lock every transaction writes when it begins
    pub transaction_timeout_secs: u64,

    pub rust_log: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let input_queue = std::env::var("REBUS_INPUT_QUEUE").unwrap_or_default();

        let config = Self {
            redis: RedisConfig::from_env(),
            input_queue,
            transaction_timeout_secs: env_u64(
                "REBUS_TRANSACTION_TIMEOUT_SECS",
                DEFAULT_TRANSACTION_TIMEOUT_SECS,
            ),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_RUST_LOG.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Configuration for an endpoint reading `input_queue`, everything else default
    pub fn for_queue(input_queue: impl Into<String>) -> Self {
        Self {
            redis: RedisConfig::default(),
            input_queue: input_queue.into(),
            transaction_timeout_secs: DEFAULT_TRANSACTION_TIMEOUT_SECS,
            rust_log: DEFAULT_RUST_LOG.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_queue.trim().is_empty() {
            anyhow::bail!("REBUS_INPUT_QUEUE must name the queue this endpoint receives from");
        }
        if self.transaction_timeout_secs == 0 {
            anyhow::bail!("REBUS_TRANSACTION_TIMEOUT_SECS must be greater than zero");
        }
        Ok(())
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.transaction_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.connect_timeout_secs)
    }
}

/// Numeric variable, falling back to `default` when unset or unparsable
pub(crate) fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, default, "Invalid number, using default");
            default
        }),
        Err(_) => default,
    }
}
