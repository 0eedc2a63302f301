//! Main entry point for rig-server.
//!
//! Loads configuration, sets up logging and metrics, then runs the health and
//! metrics endpoints and the lock-guarded job until a signal arrives.

use std::sync::Arc;

use clap::Parser;
use rig_locker::{LockMetrics, Locker, RedisLockStore};
use rig_server::{
    AppConfig, Cli, HeartbeatTask, LockedJob,
    startup::{self, ServiceGroup},
};
use tracing::{info, info_span};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli)?;

    startup::init_logging(&config.logging)?;
    let prometheus = rig_server::metrics::init_metrics()?;

    let store = RedisLockStore::connect(&config.redis.url)
        .await?
        .with_prefix(config.redis.key_prefix.clone());
    info!(prefix = %config.redis.key_prefix, "connected to redis");

    let locker = Locker::new(store, config.locker.retry_policy()?)?
        .with_span(info_span!("locker"))
        .with_metrics(LockMetrics::new());

    let shutdown = startup::wait_for_shutdown_signal().await;
    let mut group = ServiceGroup::new(shutdown);
    group.add_shutdown_watcher();

    if config.health.enabled {
        let server = startup::health_server(
            &config.health.address,
            config.health.port,
            &config.health.path,
        )?;
        group.add("health", startup::serve_until_shutdown(server, group.signal()));
    }

    if config.metrics.enabled {
        let server = startup::metrics_server(
            &config.metrics.address,
            config.metrics.port,
            &config.metrics.path,
            prometheus,
        )?;
        group.add("metrics", startup::serve_until_shutdown(server, group.signal()));
    }

    if config.job.enabled {
        let job = LockedJob::new(
            locker,
            config.job.lock_key.clone(),
            config.job.lock_ttl(),
            config.job.interval(),
            Arc::new(HeartbeatTask),
        );
        group.add("job", job.run(group.signal()));
    }

    group.run().await?;
    info!("Shutdown complete");
    Ok(())
}
