//! Backing store abstraction for lock records
//!
//! A store only has to provide two atomic primitives:
//! - set-if-absent with expiry (`try_acquire`)
//! - compare-and-delete on the owner token (`release`)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::handle::OwnershipToken;

pub mod memory;
#[cfg(feature = "redis-store")]
pub mod redis;

pub use memory::MemoryLockStore;
#[cfg(feature = "redis-store")]
pub use self::redis::RedisLockStore;

/// Result of a set-if-absent attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The record was created with the caller's token.
    Acquired,
    /// A live record already exists; nothing was written.
    AlreadyHeld,
}

/// Result of a compare-and-delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The record matched the token and was deleted.
    Released,
    /// The record is absent or carries a different token; nothing was deleted.
    NotOwned,
}

/// Atomic lock record operations shared by all clients of one store
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Create `key -> token` expiring after `ttl`, only when no live record exists.
    async fn try_acquire(
        &self,
        key: &str,
        token: &OwnershipToken,
        ttl: Duration,
    ) -> Result<AcquireOutcome, StoreError>;

    /// Delete `key` only when its live record carries `token`.
    async fn release(&self, key: &str, token: &OwnershipToken) -> Result<ReleaseOutcome, StoreError>;
}

#[async_trait]
impl<T: LockStore + ?Sized> LockStore for Arc<T> {
    async fn try_acquire(
        &self,
        key: &str,
        token: &OwnershipToken,
        ttl: Duration,
    ) -> Result<AcquireOutcome, StoreError> {
        (**self).try_acquire(key, token, ttl).await
    }

    async fn release(&self, key: &str, token: &OwnershipToken) -> Result<ReleaseOutcome, StoreError> {
        (**self).release(key, token).await
    }
}
