//! Indexer configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). The configuration is parsed and
//! validated once at startup, then each component receives its own slice
//! ([`RetryConfig`], [`PollConfig`], [`HyperSyncConfig`], ...) by value.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;

use crate::error::IndexerError;

/// Exponential backoff settings shared by every external call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every subsequent retry.
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay.
    pub max_delay: Duration,
    /// Random extra delay as a fraction of the computed backoff (`0.0..=1.0`).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            jitter: 0.25,
        }
    }
}

/// Pacing of the ingestion loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Back-off after a cycle that found no new logs.
    pub idle_delay: Duration,
    /// Back-off after a cycle that failed.
    pub error_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            idle_delay: Duration::from_millis(500),
            error_delay: Duration::from_secs(5),
        }
    }
}

/// Log source endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperSyncConfig {
    /// Primary endpoint base URL.
    pub url: String,
    /// Alternative endpoint used once the primary exhausts its retries.
    pub fallback_url: Option<String>,
    /// Optional bearer token.
    pub api_token: Option<String>,
    /// Monitored contract.
    pub contract_address: Address,
    /// Number of most recent blocks excluded from queries.
    pub confirmation_depth: u64,
}

/// Top-level indexer configuration.
///
/// Loaded once at startup via [`IndexerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// PostgreSQL connection string.
    pub database_url: String,

    /// Maximum number of database connections in the pool.
    pub database_max_connections: u32,

    /// Minimum idle connections in the pool.
    pub database_min_connections: u32,

    /// Timeout in seconds for acquiring a database connection.
    pub database_connect_timeout_secs: u64,

    /// Apply pending migrations on startup.
    pub run_migrations: bool,

    /// Log source settings.
    pub hypersync: HyperSyncConfig,

    /// JSON-RPC endpoint of the chain node.
    pub rpc_url: String,

    /// Block the cursor starts from when no progress is stored yet.
    pub start_block: u64,

    /// Loop pacing.
    pub poll: PollConfig,

    /// Backoff policy for external calls.
    pub retry: RetryConfig,

    /// Per-request HTTP timeout.
    pub http_timeout: Duration,

    /// Metadata enrichment endpoint; `None` disables enrichment.
    pub metadata_url: Option<String>,

    /// Socket address of the operations endpoint.
    pub listen_addr: SocketAddr,

    /// Capacity of the notification broadcast channel.
    pub notification_bus_capacity: usize,

    /// Emit JSON logs instead of human-readable ones.
    pub json_logs: bool,
}

impl IndexerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Config`] if a required variable is missing
    /// or any value fails validation.
    pub fn from_env() -> Result<Self, IndexerError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Config`] if a required key is missing or any
    /// value fails validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| IndexerError::Config(format!("{key} must be set")))
        };

        let contract_address = Address::from_str(required("CONTRACT_ADDRESS")?.trim())
            .map_err(|e| IndexerError::Config(format!("CONTRACT_ADDRESS: {e}")))?;

        let listen_addr = get("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| IndexerError::Config(format!("LISTEN_ADDR: {e}")))?;

        let config = Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            database_min_connections: parse_or(&get, "DATABASE_MIN_CONNECTIONS", 2)?,
            database_connect_timeout_secs: parse_or(&get, "DATABASE_CONNECT_TIMEOUT_SECS", 5)?,
            run_migrations: parse_bool(&get, "RUN_MIGRATIONS", true)?,
            hypersync: HyperSyncConfig {
                url: required("HYPERSYNC_URL")?,
                fallback_url: get("HYPERSYNC_FALLBACK_URL"),
                api_token: get("HYPERSYNC_API_TOKEN"),
                contract_address,
                confirmation_depth: parse_or(&get, "CONFIRMATION_DEPTH", 12)?,
            },
            rpc_url: required("RPC_URL")?,
            start_block: parse_or(&get, "START_BLOCK", 0)?,
            poll: PollConfig {
                idle_delay: Duration::from_millis(parse_or(&get, "POLL_IDLE_DELAY_MS", 500)?),
                error_delay: Duration::from_millis(parse_or(&get, "POLL_ERROR_DELAY_MS", 5_000)?),
            },
            retry: RetryConfig {
                max_attempts: parse_or(&get, "RETRY_MAX_ATTEMPTS", 5)?,
                base_delay: Duration::from_millis(parse_or(&get, "RETRY_BASE_DELAY_MS", 200)?),
                max_delay: Duration::from_millis(parse_or(&get, "RETRY_MAX_DELAY_MS", 10_000)?),
                jitter: parse_or(&get, "RETRY_JITTER", 0.25)?,
            },
            http_timeout: Duration::from_secs(parse_or(&get, "HTTP_TIMEOUT_SECS", 30)?),
            metadata_url: get("METADATA_URL"),
            listen_addr,
            notification_bus_capacity: parse_or(&get, "NOTIFICATION_BUS_CAPACITY", 1_024)?,
            json_logs: get("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), IndexerError> {
        if self.retry.max_attempts == 0 {
            return Err(IndexerError::Config(
                "RETRY_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(IndexerError::Config(
                "RETRY_JITTER must be within [0, 1]".into(),
            ));
        }
        if self.poll.idle_delay.is_zero() {
            return Err(IndexerError::Config(
                "POLL_IDLE_DELAY_MS must be greater than 0".into(),
            ));
        }
        if self.database_min_connections > self.database_max_connections {
            return Err(IndexerError::Config(
                "DATABASE_MIN_CONNECTIONS exceeds DATABASE_MAX_CONNECTIONS".into(),
            ));
        }
        if self.notification_bus_capacity == 0 {
            return Err(IndexerError::Config(
                "NOTIFICATION_BUS_CAPACITY must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Parses an optional key as `T`, returning `default` when it is unset.
/// A present but unparsable value is a configuration error.
fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, IndexerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| IndexerError::Config(format!("{key}: {e}"))),
        None => Ok(default),
    }
}

/// Parses a boolean key. Accepts `true`/`1`/`false`/`0` (case-insensitive).
fn parse_bool<G>(get: &G, key: &str, default: bool) -> Result<bool, IndexerError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(other) => Err(IndexerError::Config(format!(
            "{key}: expected a boolean, got {other:?}"
        ))),
    }
}
