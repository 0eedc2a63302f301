// Service runtime for rig - health and metrics endpoints, signal handling and
// lock-guarded periodic jobs on top of rig-locker

pub mod job; // Lock-guarded periodic jobs
pub mod metrics; // Prometheus recorder setup
pub mod model; // Configuration
pub mod startup; // Logging, HTTP endpoints and lifecycle

pub use job::{HeartbeatTask, JobTask, LockedJob, TickOutcome};
pub use model::{AppConfig, Cli};
