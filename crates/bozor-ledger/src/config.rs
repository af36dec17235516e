//! # Ledger Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BOZOR_DATABASE_PATH=/var/lib/bozor/ledger.db                       │
//! │     BOZOR_EVENT_BACKEND=redis                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/bozor-ledger/ledger.toml (Linux)                         │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     bozor.db, in-memory event bus, "info" logging                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/bozor/ledger.db"
//! max_connections = 8
//! busy_timeout_ms = 5000
//!
//! [events]
//! backend = "redis"            # memory | redis
//! redis_url = "redis://127.0.0.1:6379"
//! channel_capacity = 256
//!
//! [logging]
//! level = "info,bozor_ledger=debug"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use bozor_db::DbConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. `:memory:` gives a throwaway database.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on another writer's lock.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("bozor.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Event Settings
// =============================================================================

/// Which bus carries change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventBackend {
    /// Single process: subscribers in this process only.
    #[default]
    Memory,

    /// Redis pub/sub: subscribers in every process sharing the Redis server.
    Redis,
}

impl std::fmt::Display for EventBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventBackend::Memory => write!(f, "memory"),
            EventBackend::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for EventBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in-memory" | "local" => Ok(EventBackend::Memory),
            "redis" => Ok(EventBackend::Redis),
            other => Err(ConfigError::Invalid(format!(
                "Unknown event backend: '{}'. Valid options: memory, redis",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    #[serde(default)]
    pub backend: EventBackend,

    /// Required when `backend = "redis"`.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Per-channel buffer. A subscriber further behind than this skips
    /// the oldest events.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for EventSettings {
    fn default() -> Self {
        EventSettings {
            backend: EventBackend::default(),
            redis_url: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info,sqlx=warn".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: default_log_level(),
        }
    }
}

// =============================================================================
// Ledger Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub events: EventSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`ledger.toml`), if it exists
    /// 3. `BOZOR_*` environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.events.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "events.channel_capacity must be greater than 0".into(),
            ));
        }

        if self.events.backend == EventBackend::Redis {
            match self.events.redis_url.as_deref() {
                None => {
                    return Err(ConfigError::Invalid(
                        "events.redis_url is required when events.backend is redis".into(),
                    ))
                }
                Some(url) if !url.starts_with("redis://") && !url.starts_with("rediss://") => {
                    return Err(ConfigError::Invalid(format!(
                        "Redis URL must start with redis:// or rediss://, got: {}",
                        url
                    )))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Applies `BOZOR_*` overrides read through `lookup`.
    ///
    /// `load` passes the process environment; tests pass a map.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("BOZOR_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("BOZOR_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid BOZOR_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(ms) = lookup("BOZOR_DB_BUSY_TIMEOUT_MS") {
            match ms.parse::<u64>() {
                Ok(n) => self.database.busy_timeout_ms = n,
                Err(_) => warn!(value = %ms, "Ignoring invalid BOZOR_DB_BUSY_TIMEOUT_MS"),
            }
        }

        if let Some(backend) = lookup("BOZOR_EVENT_BACKEND") {
            match backend.parse() {
                Ok(parsed) => {
                    debug!(backend = %backend, "Overriding event backend from environment");
                    self.events.backend = parsed;
                }
                Err(_) => warn!(backend = %backend, "Unknown event backend in environment"),
            }
        }

        if let Some(url) = lookup("BOZOR_REDIS_URL") {
            self.events.redis_url = Some(url);
        }

        if let Some(level) = lookup("BOZOR_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// `ledger.toml` in the platform config directory.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("uz", "bozor", "bozor-ledger")
            .map(|dirs| dirs.config_dir().join("ledger.toml"))
    }

    /// Database settings in the shape `bozor-db` takes.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.database.path, PathBuf::from("bozor.db"));
        assert_eq!(config.events.backend, EventBackend::Memory);
        assert_eq!(config.events.channel_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LedgerConfig::from_toml(
            r#"
            [database]
            path = "/tmp/ledger.db"

            [events]
            backend = "redis"
            redis_url = "redis://127.0.0.1:6379"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/ledger.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.events.backend, EventBackend::Redis);
        assert_eq!(config.logging.level, "info,sqlx=warn");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redis_backend_needs_url() {
        let mut config = LedgerConfig::default();
        config.events.backend = EventBackend::Redis;
        assert!(config.validate().is_err());

        config.events.redis_url = Some("http://127.0.0.1".to_string());
        assert!(config.validate().is_err());

        config.events.redis_url = Some("redis://127.0.0.1".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("BOZOR_DATABASE_PATH", "/data/bozor.db"),
            ("BOZOR_DB_MAX_CONNECTIONS", "12"),
            ("BOZOR_DB_BUSY_TIMEOUT_MS", "not-a-number"),
            ("BOZOR_EVENT_BACKEND", "redis"),
            ("BOZOR_REDIS_URL", "redis://cache:6379"),
        ]
        .into_iter()
        .collect();

        let mut config = LedgerConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/data/bozor.db"));
        assert_eq!(config.database.max_connections, 12);
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert_eq!(config.events.backend, EventBackend::Redis);
        assert_eq!(config.events.redis_url.as_deref(), Some("redis://cache:6379"));
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("memory".parse::<EventBackend>().unwrap(), EventBackend::Memory);
        assert_eq!("REDIS".parse::<EventBackend>().unwrap(), EventBackend::Redis);
        assert!("kafka".parse::<EventBackend>().is_err());
    }

    #[test]
    fn test_db_config_mapping() {
        let mut config = LedgerConfig::default();
        config.database.busy_timeout_ms = 250;
        config.database.max_connections = 3;

        let db = config.db_config();
        assert_eq!(db.max_connections, 3);
        assert_eq!(db.busy_timeout, Duration::from_millis(250));
    }
}
