//! Process-wide configuration, read once from the environment at startup.
//!
//! A single immutable config snapshot, built eagerly so a missing or
//! malformed environment variable fails fast at boot rather than partway
//! through a request.

use std::env;
use std::fmt;
use std::time::Duration;

/// Top-level configuration, built once in `main` and shared as `Arc<Config>`.
#[derive(Clone)]
pub struct Config {
    pub db: DbConfig,
    pub listen: ListenConfig,
    pub retention: RetentionConfig,
    pub node_app_instance: String,
    pub auto_run_migrations_disabled: bool,
    pub rate_limit: RateLimitConfig,
    pub upstream: Option<UpstreamConfig>,
}

#[derive(Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct RetentionConfig {
    pub log_retention_days: i64,
    pub inactive_website_days: i64,
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max: u64,
    pub window: Duration,
    pub cache_capacity: usize,
    pub allowlist: Vec<String>,
}

#[derive(Clone)]
pub struct UpstreamConfig {
    pub server: String,
    pub api_key: String,
    pub batch_size: u64,
    pub batch_interval: Duration,
    pub batch_size_min: u64,
    pub batch_size_recovery: u64,
    pub compression: bool,
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("server", &self.server)
            .field("api_key", &"***")
            .field("batch_size", &self.batch_size)
            .field("batch_interval", &self.batch_interval)
            .field("batch_size_min", &self.batch_size_min)
            .field("batch_size_recovery", &self.batch_size_recovery)
            .field("compression", &self.compression)
            .finish()
    }
}

/// Error raised when a required environment variable is missing or invalid.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for environment variable {0}: {1}")]
    Invalid(&'static str, String),
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid(Box::leak(name.to_string().into_boxed_str()), raw)),
        Err(_) => Ok(default),
    }
}

fn bool_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"),
        Err(_) => default,
    }
}

impl Config {
    /// Build the configuration from the process environment, failing fast
    /// when required values are missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        let db = DbConfig {
            host: require("DB_HOST")?,
            port: optional_parsed("DB_PORT", 3306u16)?,
            user: require("DB_USER")?,
            password: require("DB_PASSWORD")?,
            database: require("DB_NAME")?,
            max_connections: optional_parsed("DB_POOL_SIZE", 10u32)?,
        };

        let listen = ListenConfig {
            host: optional("HOST", "0.0.0.0"),
            port: optional_parsed("PORT", 8080u16)?,
        };

        let retention = RetentionConfig {
            log_retention_days: optional_parsed("LOG_RETENTION_DAYS", 30i64)?,
            inactive_website_days: optional_parsed("INACTIVE_WEBSITE_DAYS", 45i64)?,
        };

        let node_app_instance = optional("NODE_APP_INSTANCE", "0");
        let auto_run_migrations_disabled = bool_flag("AUTO_RUN_MIGRATIONS_DISABLED", false);

        let rate_limit = RateLimitConfig {
            enabled: bool_flag("RATE_LIMIT_ENABLED", true),
            max: optional_parsed("RATE_LIMIT_MAX", 120u64)?,
            window: Duration::from_secs(optional_parsed("RATE_LIMIT_WINDOW", 60u64)?),
            cache_capacity: optional_parsed("RATE_LIMIT_CACHE", 10_000usize)?,
            allowlist: env::var("RATE_LIMIT_ALLOWLIST")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default(),
        };

        let upstream = if bool_flag("UPSTREAM_ENABLED", false) {
            Some(UpstreamConfig {
                server: require("UPSTREAM_SERVER")?,
                api_key: require("UPSTREAM_API_KEY")?,
                batch_size: optional_parsed("UPSTREAM_BATCH_SIZE", 1000u64)?,
                batch_interval: Duration::from_secs(optional_parsed("UPSTREAM_BATCH_INTERVAL", 30u64)?),
                batch_size_min: optional_parsed("UPSTREAM_BATCH_SIZE_MIN", 100u64)?,
                batch_size_recovery: optional_parsed("UPSTREAM_BATCH_SIZE_RECOVERY", 500u64)?,
                compression: bool_flag("UPSTREAM_COMPRESSION", true),
            })
        } else {
            None
        };

        Ok(Self {
            db,
            listen,
            retention,
            node_app_instance,
            auto_run_migrations_disabled,
            rate_limit,
            upstream,
        })
    }

    /// The sole mechanism for identifying the singleton-task-running node.
    pub fn is_worker_zero(&self) -> bool {
        self.node_app_instance == "0"
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("db", &self.db)
            .field("listen", &self.listen)
            .field("retention", &self.retention)
            .field("node_app_instance", &self.node_app_instance)
            .field("auto_run_migrations_disabled", &self.auto_run_migrations_disabled)
            .field("rate_limit", &self.rate_limit)
            .field("upstream", &self.upstream)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_zero_is_the_literal_string_zero() {
        let mut cfg = minimal_config();
        cfg.node_app_instance = "0".to_string();
        assert!(cfg.is_worker_zero());

        cfg.node_app_instance = "1".to_string();
        assert!(!cfg.is_worker_zero());
    }

    fn minimal_config() -> Config {
        Config {
            db: DbConfig {
                host: "localhost".into(),
                port: 3306,
                user: "root".into(),
                password: "secret".into(),
                database: "logs".into(),
                max_connections: 10,
            },
            listen: ListenConfig { host: "0.0.0.0".into(), port: 8080 },
            retention: RetentionConfig { log_retention_days: 30, inactive_website_days: 45 },
            node_app_instance: "0".into(),
            auto_run_migrations_disabled: false,
            rate_limit: RateLimitConfig {
                enabled: true,
                max: 120,
                window: Duration::from_secs(60),
                cache_capacity: 10_000,
                allowlist: vec![],
            },
            upstream: None,
        }
    }

    #[test]
    fn db_config_debug_redacts_password() {
        let cfg = minimal_config();
        let rendered = format!("{:?}", cfg.db);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("***"));
    }
}
