//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on malformed values. Every option has
//! a default, so an empty environment yields a working development setup.
//! API keys are wrapped in `secrecy::SecretString` to prevent log leaks.

pub mod secrets;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use secrets::ApiKeys;

/// Upper bound on `METRICS_RETENTION_DAYS`, about a century.
const MAX_RETENTION_DAYS: u64 = 36_500;

/// Behaviour switches for the queue engine itself.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Enqueues beyond this many waiting tasks fail with `QueueFull`.
    pub max_queue_size: usize,
    /// When false the queue is strict FIFO and priorities are ignored.
    pub priority_enabled: bool,
    /// When false the metrics recorder is a no-op.
    pub metrics_enabled: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            priority_enabled: true,
            metrics_enabled: true,
        }
    }
}

/// Auth gate settings.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub api_keys: ApiKeys,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub queue: QueueConfig,
    /// Default wait ceiling for clients that don't pick their own.
    pub task_timeout: Duration,
    pub metrics_retention: Duration,
    pub auth: AuthConfig,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("TURNQ_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:5000".to_string());
        let bind_addr = bind_addr
            .parse()
            .map_err(|e| Error::Config(format!("TURNQ_BIND_ADDR={bind_addr}: {e}")))?;

        let auth = AuthConfig {
            enabled: parse_bool(&lookup, "REQUIRE_API_KEY", false)?,
            api_keys: lookup("API_KEYS")
                .map(|raw| ApiKeys::parse(&raw))
                .unwrap_or_default(),
        };
        if auth.enabled && auth.api_keys.is_empty() {
            return Err(Error::Config(
                "REQUIRE_API_KEY is set but API_KEYS is empty".to_string(),
            ));
        }

        let max_queue_size = parse_num(&lookup, "MAX_QUEUE_SIZE", 1000u64)? as usize;
        if max_queue_size == 0 {
            return Err(Error::Config("MAX_QUEUE_SIZE must be at least 1".to_string()));
        }

        let retention_days = parse_num(&lookup, "METRICS_RETENTION_DAYS", 7)?;
        if retention_days > MAX_RETENTION_DAYS {
            return Err(Error::Config(format!(
                "METRICS_RETENTION_DAYS={retention_days} exceeds {MAX_RETENTION_DAYS}"
            )));
        }

        Ok(Self {
            bind_addr,
            database_path: lookup("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("queue_data.db")),
            queue: QueueConfig {
                max_queue_size,
                priority_enabled: parse_bool(&lookup, "ENABLE_PRIORITY_QUEUE", true)?,
                metrics_enabled: parse_bool(&lookup, "ENABLE_METRICS", true)?,
            },
            task_timeout: Duration::from_secs(parse_num(&lookup, "TASK_TIMEOUT", 3600)?),
            metrics_retention: Duration::from_secs(retention_days * 24 * 60 * 60),
            auth,
            otel_endpoint: lookup("OTEL_ENDPOINT").filter(|s| !s.is_empty()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_bool<F>(lookup: &F, name: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(Error::Config(format!("{name}={raw} is not a boolean"))),
        },
    }
}

fn parse_num<F>(lookup: &F, name: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{name}={raw}: {e}"))),
    }
}
