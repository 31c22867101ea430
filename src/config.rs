use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::trace;

use crate::Target;

/// Collection interval used when none (or a non-positive one) is configured.
pub const DEFAULT_COLLECTION_INTERVAL: Duration = Duration::from_secs(10);

/// Pause between two health check cycles.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound for each individual reachability probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Largest accepted value for any `*_seconds` setting (one week).
pub const MAX_CONFIGURED_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Errors that make a configuration unusable
///
/// All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no servers configured")]
    NoServers,

    #[error("server #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("server name '{0}' is configured more than once")]
    DuplicateName(String),

    #[error("{field} = {value} exceeds the maximum of {max} seconds")]
    OutOfRange {
        field: &'static str,
        value: i64,
        max: i64,
    },

    #[error("server '{name}' has invalid address '{address}': {reason}")]
    InvalidAddress {
        name: String,
        address: String,
        reason: String,
    },
}

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence, registrations are not stable across restarts)
    #[serde(rename = "none")]
    None,

    /// SQLite database
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./metrics.db")
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CollectorConfig {
    /// Seconds between two samples of the same target
    pub interval_seconds: Option<i64>,
}

impl CollectorConfig {
    /// Effective collection interval; non-positive values fall back to the default.
    pub fn interval(&self) -> Duration {
        positive_seconds(self.interval_seconds).unwrap_or(DEFAULT_COLLECTION_INTERVAL)
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct HealthConfig {
    pub interval_seconds: Option<i64>,
    pub timeout_seconds: Option<i64>,
    /// Suppress the routine OK notices for healthy targets
    #[serde(default)]
    pub quiet: bool,
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        positive_seconds(self.interval_seconds).unwrap_or(DEFAULT_HEALTH_INTERVAL)
    }

    pub fn timeout(&self) -> Duration {
        positive_seconds(self.timeout_seconds).unwrap_or(DEFAULT_PROBE_TIMEOUT)
    }
}

fn positive_seconds(seconds: Option<i64>) -> Option<Duration> {
    seconds
        .filter(|seconds| *seconds > 0)
        .map(|seconds| Duration::from_secs(seconds as u64))
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub servers: Vec<Target>,

    /// Storage configuration (optional - defaults to SQLite)
    pub storage: Option<StorageConfig>,

    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub health: HealthConfig,
}

impl Config {
    pub fn storage(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_default()
    }

    /// Check the server list and timings for problems that would break
    /// registration, collection or probing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_seconds("collector.interval_seconds", self.collector.interval_seconds)?;
        check_seconds("health.interval_seconds", self.health.interval_seconds)?;
        check_seconds("health.timeout_seconds", self.health.timeout_seconds)?;

        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }

        let mut seen = HashSet::new();
        for (index, server) in self.servers.iter().enumerate() {
            if server.name.trim().is_empty() {
                return Err(ConfigError::EmptyName { index });
            }
            if !seen.insert(server.name.as_str()) {
                return Err(ConfigError::DuplicateName(server.name.clone()));
            }
            validate_address(server)?;
        }

        Ok(())
    }
}

fn check_seconds(field: &'static str, seconds: Option<i64>) -> Result<(), ConfigError> {
    match seconds {
        Some(value) if value > MAX_CONFIGURED_SECONDS => Err(ConfigError::OutOfRange {
            field,
            value,
            max: MAX_CONFIGURED_SECONDS,
        }),
        _ => Ok(()),
    }
}

fn validate_address(server: &Target) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidAddress {
        name: server.name.clone(),
        address: server.address.clone(),
        reason: reason.to_string(),
    };

    let Some((host, port)) = server.address.rsplit_once(':') else {
        return Err(invalid("expected host:port"));
    };

    if host.is_empty() {
        return Err(invalid("missing host"));
    }

    match port.parse::<u16>() {
        Ok(0) => Err(invalid("port must not be 0")),
        Ok(_) => Ok(()),
        Err(_) => Err(invalid("port is not a number between 1 and 65535")),
    }
}

pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
}

pub fn read_config_file(path: &str) -> Result<Config, ConfigError> {
    let file_content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    parse_config(&file_content).inspect(|config| trace!("loaded config: {config:?}"))
}
