//! rig-server wiring tests: shipped configuration and job lifecycle

use std::sync::Arc;
use std::time::Duration;

use rig_locker::{Backoff, Locker, MemoryLockStore};
use rig_server::startup::{ServiceGroup, ShutdownSignal};
use rig_server::{AppConfig, Cli, HeartbeatTask, LockedJob};

fn shipped_config_path() -> String {
    format!("{}/../../conf/application.yml", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn test_shipped_configuration_loads() {
    let cli = Cli {
        config: Some(shipped_config_path()),
        log_level: Some("rig_locker=debug".to_string()),
    };
    let config = AppConfig::load(&cli).unwrap();

    assert_eq!(config.redis.key_prefix, "rig:lock:");
    assert_eq!(config.health.port, 8081);
    assert_eq!(config.metrics.path, "/metrics");
    assert_eq!(config.job.lock_key, "rig:job");
    assert_eq!(config.logging.level, "rig_locker=debug");

    let policy = config.locker.retry_policy().unwrap();
    assert_eq!(policy.retry_count, 3);
    assert_eq!(policy.retry_timeout, Duration::from_secs(3));
    assert_eq!(policy.backoff, Backoff::Linear);
}

#[tokio::test(start_paused = true)]
async fn test_group_stops_job_on_shutdown() {
    let store = MemoryLockStore::new();
    let locker = Locker::new(store.clone(), Default::default()).unwrap();

    let signal = ShutdownSignal::new();
    let mut group = ServiceGroup::new(signal.clone());
    group.add_shutdown_watcher();

    let job = LockedJob::new(
        locker,
        "rig:job",
        Duration::from_secs(30),
        Duration::from_secs(10),
        Arc::new(HeartbeatTask),
    );
    group.add("job", job.run(group.signal()));

    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(25)).await;
        trigger.shutdown();
    });

    group.run().await.unwrap();
    assert!(signal.is_shutdown());
    assert!(store.owner("rig:job").is_none());
}
