// Metrics module for observability
// Installs the Prometheus recorder and describes every metric the server emits

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::job::JOB_RUNS_TOTAL;

/// Install the global Prometheus recorder and register metric descriptions.
///
/// Should be called once at application startup, before any `LockMetrics`
/// handles are created.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_metrics();
    tracing::info!("Metrics initialized");
    Ok(handle)
}

/// Register descriptions for lock and job metrics with the installed recorder.
pub fn describe_metrics() {
    rig_locker::metrics::describe();
    describe_counter!(JOB_RUNS_TOTAL, "Lock-guarded job ticks by outcome");
}
