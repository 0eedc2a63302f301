//! Singleton periodic job guarded by a distributed lock
//!
//! Every replica runs the same schedule; on each tick only the replica that
//! obtains the lock executes the task, the others skip the tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use rig_locker::{AcquireOptions, LockContext, LockError, Locker};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::startup::ShutdownSignal;

pub const JOB_RUNS_TOTAL: &str = "rig_job_runs_total";

/// Work executed while the job lock is held
#[async_trait]
pub trait JobTask: Send + Sync {
    async fn run(&self) -> anyhow::Result<()>;
}

/// What happened on one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Lock obtained and the task ran to completion
    Ran,
    /// Another replica holds the lock
    Skipped,
}

pub struct LockedJob {
    locker: Locker,
    lock_key: String,
    lock_ttl: Duration,
    interval: Duration,
    task: Arc<dyn JobTask>,
}

impl LockedJob {
    pub fn new(
        locker: Locker,
        lock_key: impl Into<String>,
        lock_ttl: Duration,
        interval: Duration,
        task: Arc<dyn JobTask>,
    ) -> Self {
        Self {
            locker,
            lock_key: lock_key.into(),
            lock_ttl,
            interval,
            task,
        }
    }

    /// Run one tick: acquire, execute, release.
    ///
    /// The lock is released even when the task fails. Release uses its own
    /// context bounded by the lock TTL, so shutting down does not strand the key.
    pub async fn tick(&self, cancel: &CancellationToken) -> anyhow::Result<TickOutcome> {
        let options = AcquireOptions::new().with_cancellation(cancel.clone());
        let handle = match self.locker.acquire_with(&self.lock_key, self.lock_ttl, options).await {
            Ok(handle) => handle,
            Err(e) if e.is_contention() => {
                debug!(key = %self.lock_key, "job lock held elsewhere, skipping tick");
                counter!(JOB_RUNS_TOTAL, "outcome" => "skipped").increment(1);
                return Ok(TickOutcome::Skipped);
            }
            Err(e) => {
                counter!(JOB_RUNS_TOTAL, "outcome" => "error").increment(1);
                return Err(e.into());
            }
        };

        let result = self.task.run().await;

        let release_ctx = LockContext::new().with_timeout(self.lock_ttl);
        match handle.release_with(&release_ctx).await {
            Ok(()) => {}
            Err(LockError::NotLocked { .. }) => {
                warn!(key = %self.lock_key, "job outlived its lock ttl");
            }
            Err(e) => error!(key = %self.lock_key, error = %e, "failed to release job lock"),
        }

        match result {
            Ok(()) => {
                counter!(JOB_RUNS_TOTAL, "outcome" => "ran").increment(1);
                Ok(TickOutcome::Ran)
            }
            Err(e) => {
                counter!(JOB_RUNS_TOTAL, "outcome" => "failed").increment(1);
                Err(e)
            }
        }
    }

    /// Tick every interval until `shutdown` fires.
    ///
    /// Task and store failures are logged and the schedule continues.
    pub async fn run(self, shutdown: ShutdownSignal) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let watcher = shutdown.clone();
        tokio::spawn(async move {
            watcher.wait().await;
            trigger.cancel();
        });

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(key = %self.lock_key, interval = ?self.interval, "job scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let span = info_span!("job_tick", key = %self.lock_key);
            match self.tick(&cancel).instrument(span).await {
                Ok(TickOutcome::Ran) => debug!(key = %self.lock_key, "job tick completed"),
                Ok(TickOutcome::Skipped) => {}
                Err(e) => match e.downcast_ref::<LockError>() {
                    Some(lock_err) if lock_err.is_interrupted() => break,
                    _ => error!(key = %self.lock_key, error = %e, "job tick failed"),
                },
            }
        }

        info!(key = %self.lock_key, "job scheduler stopped");
        Ok(())
    }
}

/// Task that only reports that it ran
pub struct HeartbeatTask;

#[async_trait]
impl JobTask for HeartbeatTask {
    async fn run(&self) -> anyhow::Result<()> {
        info!("heartbeat");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use rig_locker::{MemoryLockStore, RetryPolicy};

    use super::*;

    #[derive(Default)]
    struct CountingTask {
        runs: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl JobTask for CountingTask {
        async fn run(&self) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail {
                anyhow::bail!("task failed");
            }
            Ok(())
        }
    }

    fn job(store: &MemoryLockStore, task: Arc<dyn JobTask>) -> LockedJob {
        let locker = Locker::new(store.clone(), RetryPolicy::no_retry()).unwrap();
        LockedJob::new(locker, "job", Duration::from_secs(5), Duration::from_secs(1), task)
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_one_replica_runs_per_tick() {
        let store = MemoryLockStore::new();
        let task = Arc::new(CountingTask::default());
        let a = job(&store, task.clone());
        let b = job(&store, task.clone());
        let cancel = CancellationToken::new();

        let (ra, rb) = tokio::join!(a.tick(&cancel), b.tick(&cancel));
        let mut outcomes = vec![ra.unwrap(), rb.unwrap()];
        outcomes.sort_by_key(|o| *o == TickOutcome::Skipped);

        assert_eq!(outcomes, vec![TickOutcome::Ran, TickOutcome::Skipped]);
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
        assert!(store.owner("job").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_task_still_releases_lock() {
        let store = MemoryLockStore::new();
        let task = Arc::new(CountingTask {
            fail: true,
            ..Default::default()
        });
        let job = job(&store, task);

        let err = job.tick(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "task failed");
        assert!(store.owner("job").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let store = MemoryLockStore::new();
        let task = Arc::new(CountingTask::default());
        let job = job(&store, task.clone());
        let shutdown = ShutdownSignal::new();

        let running = tokio::spawn(job.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown.shutdown();

        running.await.unwrap().unwrap();
        assert_eq!(task.runs.load(Ordering::SeqCst), 3);
    }
}
