//! Logging initialization module.
//!
//! Installs the global `tracing` subscriber in one of three output formats:
//!
//! | Format    | Output                                        |
//! |-----------|-----------------------------------------------|
//! | `json`    | Bunyan JSON records (default)                 |
//! | `console` | Human readable, ANSI colored                  |
//! | `text`    | Human readable, no colors                     |
//!
//! `RUST_LOG` takes precedence over the configured level.

use serde::Deserialize;
use tracing::subscriber::set_global_default;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

const DEFAULT_LEVEL: &str = "debug";

/// Output formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Console,
    Text,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "console" => Ok(Self::Console),
            "text" => Ok(Self::Text),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

impl LogFormat {
    /// Parse `s`, falling back to JSON for unknown names.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level or full filter directive (e.g. `info,rig_locker=debug`)
    pub level: String,
    /// Format name; unknown names fall back to `json`
    pub format: String,
    /// Application name recorded in JSON records
    pub name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            format: "json".to_string(),
            name: "rig".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn format(&self) -> LogFormat {
        LogFormat::parse_or_default(&self.format)
    }

    /// Filter from `RUST_LOG`, else the configured level, else `debug`.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(&self.level))
    }
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

/// Initialize the global subscriber.
///
/// This should only be called once during application startup.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    LogTracer::init().map_err(|e| anyhow::anyhow!("Failed to set logger: {}", e))?;

    let env_filter = config.env_filter();
    let result = match config.format() {
        LogFormat::Json => {
            let formatting_layer = BunyanFormattingLayer::new(config.name.clone(), std::io::stdout);
            set_global_default(
                Registry::default()
                    .with(env_filter)
                    .with(JsonStorageLayer)
                    .with(formatting_layer),
            )
        }
        LogFormat::Console => set_global_default(
            Registry::default()
                .with(env_filter)
                .with(fmt::layer().with_ansi(true).with_target(true)),
        ),
        LogFormat::Text => set_global_default(
            Registry::default()
                .with(env_filter)
                .with(fmt::layer().with_ansi(false).with_target(true)),
        ),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to set subscriber: {}", e))
}
