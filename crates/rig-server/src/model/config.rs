//! Configuration management for rig-server
//!
//! Settings come from `conf/application.yml` (or `--config`), overridden by
//! `RIG_*` environment variables such as `RIG_REDIS__URL`, and finally by
//! command line flags.

use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use rig_common::validation::{validate_endpoint_path, validate_lock_key, validate_port};
use rig_common::{DEFAULT_CONFIG_FILE, ENV_PREFIX, RigError};
use rig_locker::{Backoff, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_TIMEOUT, RetryPolicy};
use serde::Deserialize;
use validator::Validate;

use crate::startup::LoggingConfig;

/// Command line arguments for the server
#[derive(Debug, Default, Parser)]
#[command(name = "rig-server", version, about = "Run lock-guarded jobs with health and metrics endpoints")]
pub struct Cli {
    /// Configuration file
    #[arg(short = 'c', long = "config", env = "RIG_CONFIG")]
    pub config: Option<String>,
    /// Log level or filter directive, overrides `logging.level`
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

/// Redis connection settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct RedisConfig {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub url: String,
    /// Prefix prepended to every lock key
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            key_prefix: "rig:lock:".to_string(),
        }
    }
}

/// Lock acquisition retry settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct LockerConfig {
    pub retry_count: u32,
    #[validate(range(min = 1, message = "must be greater than zero"))]
    pub retry_timeout_ms: u64,
    /// `linear` or `linear_jitter`
    pub backoff: String,
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            retry_timeout_ms: DEFAULT_RETRY_TIMEOUT.as_millis() as u64,
            backoff: "linear".to_string(),
        }
    }
}

impl LockerConfig {
    pub fn retry_policy(&self) -> Result<RetryPolicy, RigError> {
        let backoff: Backoff = self.backoff.parse().map_err(RigError::ConfigError)?;
        Ok(RetryPolicy::new(self.retry_count, Duration::from_millis(self.retry_timeout_ms))
            .with_backoff(backoff))
    }
}

/// Health check endpoint
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub address: String,
    #[validate(custom(function = "validate_port"))]
    pub port: u16,
    #[validate(custom(function = "validate_endpoint_path"))]
    pub path: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_address(),
            port: 8081,
            path: "/health".to_string(),
        }
    }
}

/// Prometheus scrape endpoint
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub address: String,
    #[validate(custom(function = "validate_port"))]
    pub port: u16,
    #[validate(custom(function = "validate_endpoint_path"))]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_address(),
            port: 9090,
            path: "/metrics".to_string(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

/// Periodic job guarded by a distributed lock
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct JobConfig {
    pub enabled: bool,
    #[validate(custom(function = "validate_lock_key"))]
    pub lock_key: String,
    #[validate(range(min = 1, message = "must be greater than zero"))]
    pub lock_ttl_ms: u64,
    #[validate(range(min = 1, message = "must be greater than zero"))]
    pub interval_ms: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lock_key: "rig:job".to_string(),
            lock_ttl_ms: 30_000,
            interval_ms: 10_000,
        }
    }
}

impl JobConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Application configuration loaded from config files and environment
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct AppConfig {
    #[validate(nested)]
    pub redis: RedisConfig,
    #[validate(nested)]
    pub locker: LockerConfig,
    pub logging: LoggingConfig,
    #[validate(nested)]
    pub health: HealthConfig,
    #[validate(nested)]
    pub metrics: MetricsConfig,
    #[validate(nested)]
    pub job: JobConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            locker: LockerConfig::default(),
            logging: LoggingConfig::default(),
            health: HealthConfig::default(),
            metrics: MetricsConfig::default(),
            job: JobConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the file named on the command line (or the default file),
    /// environment and flags, then validate.
    pub fn load(cli: &Cli) -> Result<Self, RigError> {
        let path = cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_FILE);
        let mut builder = Config::builder()
            .add_source(File::with_name(path).required(cli.config.is_some()))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(level) = &cli.log_level {
            builder = builder
                .set_override("logging.level", level.as_str())
                .map_err(config_error)?;
        }

        let config: AppConfig = builder
            .build()
            .and_then(|config| config.try_deserialize::<AppConfig>())
            .map_err(config_error)?;

        rig_common::validate(&config)?;
        Ok(config)
    }
}

fn config_error(e: config::ConfigError) -> RigError {
    RigError::ConfigError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(rig_common::validate(&config).is_ok());
        assert_eq!(config.health.path, "/health");
        assert_eq!(config.metrics.port, 9090);
        assert_eq!(config.job.lock_ttl(), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = LockerConfig {
            retry_count: 1,
            retry_timeout_ms: 100,
            backoff: "linear_jitter".to_string(),
        };
        let policy = config.retry_policy().unwrap();

        assert_eq!(policy.retry_count, 1);
        assert_eq!(policy.retry_timeout, Duration::from_millis(100));
        assert_eq!(policy.backoff, Backoff::LinearJitter);

        let config = LockerConfig {
            backoff: "exponential".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.retry_policy(), Err(RigError::ConfigError(_))));
    }

    #[test]
    fn test_validation_reports_nested_fields() {
        let mut config = AppConfig::default();
        config.health.port = 0;
        config.metrics.path = "metrics".to_string();
        config.job.lock_key = String::new();
        config.locker.retry_timeout_ms = 0;

        let errors = rig_common::validate(&config).unwrap_err();
        assert_eq!(errors.get("health.port"), Some("must not be zero"));
        assert_eq!(errors.get("metrics.path"), Some("must start with '/'"));
        assert_eq!(errors.get("job.lock_key"), Some("must not be empty"));
        assert_eq!(errors.get("locker.retry_timeout_ms"), Some("must be greater than zero"));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let cli = Cli {
            config: None,
            log_level: Some("warn".to_string()),
        };
        let config = AppConfig::load(&cli).unwrap();

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.redis.key_prefix, "rig:lock:");
    }

    #[test]
    fn test_load_partial_sections_fills_defaults() {
        let cli = Cli {
            config: Some(format!(
                "{}/tests/fixtures/partial.yml",
                env!("CARGO_MANIFEST_DIR")
            )),
            log_level: None,
        };
        let config = AppConfig::load(&cli).unwrap();

        assert!(!config.health.enabled);
        assert_eq!(config.health.port, 8081);
        assert_eq!(config.health.path, "/health");
        assert_eq!(config.metrics.port, 9191);
        assert_eq!(config.metrics.path, "/metrics");
        assert_eq!(config.metrics.address, "0.0.0.0");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let cli = Cli {
            config: Some("does/not/exist.yml".to_string()),
            log_level: None,
        };
        assert!(matches!(AppConfig::load(&cli), Err(RigError::ConfigError(_))));
    }
}
