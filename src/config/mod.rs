//! Configuration module for the reviewer backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// A malformed configuration variable.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value {value:?} for {name}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Maximum number of pooled database connections
    pub db_max_connections: u32,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Interval between task queue polls
    pub poll_interval: Duration,
    /// How long a claimed task stays owned by its worker
    pub task_lease: Duration,
    /// Upper bound on the time spent serving one request
    pub request_timeout: Duration,
    /// Fixed seed for reviewer selection; random when unset
    pub rng_seed: Option<u64>,
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("REVIEWD_DB_PATH")
            .unwrap_or_else(|| "./data/reviews.sqlite".to_string())
            .into();

        let log_level = lookup("REVIEWD_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(ConfigError {
                name: "REVIEWD_LOG_LEVEL",
                value: log_level,
            });
        }

        let rng_seed = match lookup("REVIEWD_RNG_SEED") {
            Some(raw) => Some(parse_value("REVIEWD_RNG_SEED", raw)?),
            None => None,
        };

        let poll_secs: u64 = parse_or(&lookup, "REVIEWD_POLL_INTERVAL_SECS", 5)?;
        if poll_secs == 0 {
            return Err(ConfigError {
                name: "REVIEWD_POLL_INTERVAL_SECS",
                value: poll_secs.to_string(),
            });
        }

        Ok(Self {
            db_path,
            db_max_connections: parse_or(&lookup, "REVIEWD_DB_MAX_CONNECTIONS", 5)?,
            bind_addr: parse_or(
                &lookup,
                "REVIEWD_BIND_ADDR",
                SocketAddr::from(([127, 0, 0, 1], 8080)),
            )?,
            log_level,
            log_format: parse_or(&lookup, "REVIEWD_LOG_FORMAT", LogFormat::Text)?,
            poll_interval: Duration::from_secs(poll_secs),
            task_lease: Duration::from_secs(parse_or(&lookup, "REVIEWD_TASK_LEASE_SECS", 300)?),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REVIEWD_REQUEST_TIMEOUT_SECS",
                60,
            )?),
            rng_seed,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => parse_value(name, raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError { name, value: raw })
}
