//! Lock metrics
//!
//! Handles are resolved once through the `metrics` facade; whichever recorder
//! is installed (Prometheus in rig-server) receives the samples.

use std::time::Duration;

use metrics::{Counter, Histogram, counter, describe_counter, describe_histogram, histogram};

pub const ACQUIRE_TOTAL: &str = "rig_lock_acquire_total";
pub const RELEASE_TOTAL: &str = "rig_lock_release_total";
pub const ACQUIRE_ATTEMPTS: &str = "rig_lock_acquire_attempts";
pub const ACQUIRE_DURATION: &str = "rig_lock_acquire_duration_seconds";

const OUTCOME: &str = "outcome";

/// Register metric descriptions with the installed recorder.
pub fn describe() {
    describe_counter!(ACQUIRE_TOTAL, "Lock acquisitions by outcome");
    describe_counter!(RELEASE_TOTAL, "Lock releases by outcome");
    describe_histogram!(ACQUIRE_ATTEMPTS, "Store attempts per acquisition");
    describe_histogram!(
        ACQUIRE_DURATION,
        metrics::Unit::Seconds,
        "Time spent acquiring a lock, backoff included"
    );
}

/// Pre-resolved counters and histograms for lock operations.
#[derive(Clone)]
pub struct LockMetrics {
    acquired: Counter,
    not_obtained: Counter,
    acquire_failed: Counter,
    released: Counter,
    not_locked: Counter,
    release_failed: Counter,
    attempts: Histogram,
    duration: Histogram,
}

impl LockMetrics {
    /// Resolve handles against the currently installed recorder.
    pub fn new() -> Self {
        Self {
            acquired: counter!(ACQUIRE_TOTAL, OUTCOME => "acquired"),
            not_obtained: counter!(ACQUIRE_TOTAL, OUTCOME => "not_obtained"),
            acquire_failed: counter!(ACQUIRE_TOTAL, OUTCOME => "error"),
            released: counter!(RELEASE_TOTAL, OUTCOME => "released"),
            not_locked: counter!(RELEASE_TOTAL, OUTCOME => "not_locked"),
            release_failed: counter!(RELEASE_TOTAL, OUTCOME => "error"),
            attempts: histogram!(ACQUIRE_ATTEMPTS),
            duration: histogram!(ACQUIRE_DURATION),
        }
    }

    /// Handles that discard every sample
    pub fn noop() -> Self {
        Self {
            acquired: Counter::noop(),
            not_obtained: Counter::noop(),
            acquire_failed: Counter::noop(),
            released: Counter::noop(),
            not_locked: Counter::noop(),
            release_failed: Counter::noop(),
            attempts: Histogram::noop(),
            duration: Histogram::noop(),
        }
    }

    pub(crate) fn record_acquire(&self, outcome: AcquireResult, attempts: u32, elapsed: Duration) {
        match outcome {
            AcquireResult::Acquired => self.acquired.increment(1),
            AcquireResult::NotObtained => self.not_obtained.increment(1),
            AcquireResult::Failed => self.acquire_failed.increment(1),
        }
        self.attempts.record(f64::from(attempts));
        self.duration.record(elapsed.as_secs_f64());
    }

    pub(crate) fn record_release(&self, outcome: ReleaseResult) {
        match outcome {
            ReleaseResult::Released => self.released.increment(1),
            ReleaseResult::NotLocked => self.not_locked.increment(1),
            ReleaseResult::Failed => self.release_failed.increment(1),
        }
    }
}

impl Default for LockMetrics {
    fn default() -> Self {
        Self::noop()
    }
}

impl std::fmt::Debug for LockMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockMetrics").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum AcquireResult {
    Acquired,
    NotObtained,
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ReleaseResult {
    Released,
    NotLocked,
    Failed,
}
