//! Lock manager

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{Instrument, Span, debug, trace};

use crate::config::RetryPolicy;
use crate::context::{AcquireOptions, LockContext};
use crate::error::{LockError, Result};
use crate::handle::{LockHandle, OwnershipToken};
use crate::metrics::{AcquireResult, LockMetrics};
use crate::store::{AcquireOutcome, LockStore};

/// Acquires and releases distributed locks against a shared store.
///
/// Holds no lock state of its own; every decision is made by the store's
/// atomic primitives. Cloning is cheap.
#[derive(Clone)]
pub struct Locker {
    store: Arc<dyn LockStore>,
    policy: RetryPolicy,
    span: Span,
    metrics: LockMetrics,
}

impl Locker {
    /// Create a locker, validating `policy`.
    pub fn new<S: LockStore + 'static>(store: S, policy: RetryPolicy) -> Result<Self> {
        rig_common::validate(&policy)?;
        Ok(Self {
            store: Arc::new(store),
            policy,
            span: Span::none(),
            metrics: LockMetrics::noop(),
        })
    }

    /// Parent span for lock events
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_metrics(mut self, metrics: LockMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Acquire `key` for `ttl` with the configured retry policy.
    pub async fn acquire(&self, key: &str, ttl: Duration) -> Result<LockHandle> {
        self.acquire_with(key, ttl, AcquireOptions::default()).await
    }

    /// Acquire `key` for `ttl` with per-call cancellation, deadline and retry.
    ///
    /// Only contention is retried. A store error ends the acquisition at once,
    /// and cancellation or deadline interrupts a pending round-trip or backoff.
    pub async fn acquire_with(
        &self,
        key: &str,
        ttl: Duration,
        options: AcquireOptions,
    ) -> Result<LockHandle> {
        if key.is_empty() {
            return Err(LockError::InvalidArgument(
                "lock key must not be empty".to_string(),
            ));
        }
        if ttl.is_zero() {
            return Err(LockError::InvalidArgument(
                "ttl must be greater than zero".to_string(),
            ));
        }
        let policy = match options.retry {
            Some(policy) => {
                rig_common::validate(&policy)?;
                policy
            }
            None => self.policy.clone(),
        };

        let started = Instant::now();
        let mut attempts = 0;
        let result = self
            .acquire_loop(key, ttl, &policy, &options.context, &mut attempts)
            .instrument(self.span.clone())
            .await;

        self.metrics.record_acquire(
            match &result {
                Ok(_) => AcquireResult::Acquired,
                Err(LockError::LockNotObtained { .. }) => AcquireResult::NotObtained,
                Err(_) => AcquireResult::Failed,
            },
            attempts,
            started.elapsed(),
        );

        let token = result?;
        Ok(LockHandle::new(
            key.to_string(),
            token,
            ttl,
            options.context,
            Arc::clone(&self.store),
            self.span.clone(),
            self.metrics.clone(),
        ))
    }

    async fn acquire_loop(
        &self,
        key: &str,
        ttl: Duration,
        policy: &RetryPolicy,
        context: &LockContext,
        attempts: &mut u32,
    ) -> Result<OwnershipToken> {
        let token = OwnershipToken::generate();
        let max_attempts = policy.max_attempts();

        loop {
            *attempts += 1;
            let outcome = context
                .run(self.store.try_acquire(key, &token, ttl))
                .await??;

            if outcome == AcquireOutcome::Acquired {
                debug!(key = %key, attempt = *attempts, "lock obtained");
                return Ok(token);
            }

            if *attempts >= max_attempts {
                debug!(key = %key, attempts = *attempts, "lock not obtained");
                return Err(LockError::LockNotObtained {
                    key: key.to_string(),
                    attempts: *attempts,
                });
            }

            let delay = policy.delay_after(*attempts);
            trace!(key = %key, attempt = *attempts, delay = ?delay, "lock held, backing off");
            context.run(tokio::time::sleep(delay)).await?;
        }
    }

    /// Release the lock proven by `handle` under the acquisition's context.
    pub async fn release(&self, handle: &LockHandle) -> Result<()> {
        handle.release().await
    }
}

impl std::fmt::Debug for Locker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locker")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLockStore;

    #[test]
    fn test_new_rejects_invalid_policy() {
        let err = Locker::new(MemoryLockStore::new(), RetryPolicy::new(1, Duration::ZERO)).unwrap_err();
        assert!(matches!(err, LockError::InvalidArgument(ref m) if m.contains("retry_timeout")));
    }

    #[tokio::test]
    async fn test_acquire_rejects_empty_key_and_zero_ttl() {
        let locker = Locker::new(MemoryLockStore::new(), RetryPolicy::default()).unwrap();

        let err = locker.acquire("", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, LockError::InvalidArgument(_)));

        let err = locker.acquire("key", Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, LockError::InvalidArgument(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_carries_request() {
        let locker = Locker::new(MemoryLockStore::new(), RetryPolicy::default()).unwrap();
        let handle = locker.acquire("orders", Duration::from_secs(5)).await.unwrap();

        assert_eq!(handle.key(), "orders");
        assert_eq!(handle.ttl(), Duration::from_secs(5));
        assert_eq!(
            handle.expires_at().map(|at| at - handle.acquired_at()),
            Some(Duration::from_secs(5))
        );
        locker.release(&handle).await.unwrap();
    }
}
