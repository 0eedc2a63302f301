pub mod config;

pub use config::{AppConfig, Cli, HealthConfig, JobConfig, LockerConfig, MetricsConfig, RedisConfig};
