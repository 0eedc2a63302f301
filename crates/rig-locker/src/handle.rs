//! Lock handle and ownership token

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{Instrument, Span, debug, warn};

use crate::context::LockContext;
use crate::error::{LockError, Result};
use crate::metrics::{LockMetrics, ReleaseResult};
use crate::store::{LockStore, ReleaseOutcome};

/// Random value identifying one acquisition.
///
/// Stored as the lock record's value; release only succeeds when the record
/// still carries it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnershipToken(String);

impl OwnershipToken {
    /// Fresh 128-bit random token
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnershipToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for OwnershipToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for OwnershipToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof of one successful acquisition.
///
/// Holding a handle does not guarantee the lock is still held: once the TTL
/// elapses another owner may take the key, and `release` then reports
/// `NotLocked`. Dropping a handle does not release the lock.
pub struct LockHandle {
    key: String,
    token: OwnershipToken,
    ttl: Duration,
    acquired_at: Instant,
    context: LockContext,
    store: Arc<dyn LockStore>,
    span: Span,
    metrics: LockMetrics,
}

impl LockHandle {
    pub(crate) fn new(
        key: String,
        token: OwnershipToken,
        ttl: Duration,
        context: LockContext,
        store: Arc<dyn LockStore>,
        span: Span,
        metrics: LockMetrics,
    ) -> Self {
        Self {
            key,
            token,
            ttl,
            acquired_at: Instant::now(),
            context,
            store,
            span,
            metrics,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &OwnershipToken {
        &self.token
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    /// Local estimate of when the record expires; the store's clock decides.
    ///
    /// `None` when the ttl reaches past what the clock can represent.
    pub fn expires_at(&self) -> Option<Instant> {
        self.acquired_at.checked_add(self.ttl)
    }

    /// The context given at acquisition, reused by `release`
    pub fn context(&self) -> &LockContext {
        &self.context
    }

    /// Release under the acquisition's cancellation token and deadline.
    pub async fn release(&self) -> Result<()> {
        self.release_with(&self.context).await
    }

    /// Release under a different context, e.g. after the acquisition's
    /// deadline has already passed.
    pub async fn release_with(&self, context: &LockContext) -> Result<()> {
        let result = self
            .release_inner(context)
            .instrument(self.span.clone())
            .await;

        self.metrics.record_release(match &result {
            Ok(()) => ReleaseResult::Released,
            Err(LockError::NotLocked { .. }) => ReleaseResult::NotLocked,
            Err(_) => ReleaseResult::Failed,
        });
        result
    }

    async fn release_inner(&self, context: &LockContext) -> Result<()> {
        let outcome = context
            .run(self.store.release(&self.key, &self.token))
            .await??;

        match outcome {
            ReleaseOutcome::Released => {
                debug!(key = %self.key, "unlocked");
                Ok(())
            }
            ReleaseOutcome::NotOwned => {
                warn!(key = %self.key, "unlock rejected: lock expired or owned by another holder");
                Err(LockError::NotLocked {
                    key: self.key.clone(),
                })
            }
        }
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("key", &self.key)
            .field("token", &self.token)
            .field("ttl", &self.ttl)
            .field("acquired_at", &self.acquired_at)
            .finish_non_exhaustive()
    }
}
