//! Caller supplied cancellation and deadline for lock operations

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::RetryPolicy;
use crate::error::{LockError, Result};

/// Cancellation token and deadline bounding a lock operation.
///
/// Every store round-trip and every backoff wait is raced against both, so an
/// interrupted operation returns promptly instead of finishing its current step.
#[derive(Debug, Clone, Default)]
pub struct LockContext {
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl LockContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now. A timeout past the clock's range leaves
    /// the context without a deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// Fail fast when the context is already cancelled or past its deadline.
    pub fn check(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(LockError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(LockError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `future` to completion unless the context fires first.
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output> {
        self.check()?;

        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(LockError::Cancelled),
            _ = expired => Err(LockError::DeadlineExceeded),
            output = future => Ok(output),
        }
    }
}

/// Per-call acquisition options
#[derive(Debug, Clone, Default)]
pub struct AcquireOptions {
    /// Cancellation and deadline for this acquisition and the later release
    pub context: LockContext,
    /// Overrides the locker's retry policy for this call
    pub retry: Option<RetryPolicy>,
}

impl AcquireOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: LockContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.context = self.context.with_cancellation(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.context = self.context.with_deadline(deadline);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.context = self.context.with_timeout(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_without_signals() {
        let ctx = LockContext::new();
        assert_eq!(ctx.run(async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_check_reports_cancelled_token() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = LockContext::new().with_cancellation(token);

        assert!(matches!(ctx.check(), Err(LockError::Cancelled)));
        assert!(matches!(ctx.run(async { 1 }).await, Err(LockError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_interrupted_by_deadline() {
        let ctx = LockContext::new().with_timeout(Duration::from_millis(50));
        let started = Instant::now();

        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(10)))
            .await;

        assert!(matches!(result, Err(LockError::DeadlineExceeded)));
        assert_eq!(started.elapsed(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_has_no_deadline() {
        let ctx = LockContext::new().with_timeout(Duration::MAX);

        assert!(ctx.deadline().is_none());
        assert!(ctx.check().is_ok());
        assert_eq!(ctx.run(async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_interrupted_by_cancellation() {
        let token = CancellationToken::new();
        let ctx = LockContext::new().with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let result = ctx.run(tokio::time::sleep(Duration::from_secs(10))).await;
        assert!(matches!(result, Err(LockError::Cancelled)));
        canceller.await.unwrap();
    }

    #[test]
    fn test_options_builder() {
        let options = AcquireOptions::new()
            .with_retry(RetryPolicy::no_retry())
            .with_cancellation(CancellationToken::new());

        assert_eq!(options.retry, Some(RetryPolicy::no_retry()));
        assert!(options.context.cancellation().is_some());
        assert!(options.context.deadline().is_none());
    }
}
