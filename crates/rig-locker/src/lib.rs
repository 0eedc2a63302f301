//! Rig Locker - Distributed mutex locks over a shared key-value store
//!
//! This crate provides:
//! - `Locker`: acquire/release with bounded retry and caller cancellation
//! - `LockHandle`: ownership proof for one successful acquisition
//! - `LockStore`: the two atomic store primitives (set-if-absent, compare-and-delete)
//! - Redis and in-memory store backends
//!
//! Ownership is time bound: every lock record carries a TTL enforced by the
//! store, so a crashed holder never keeps a key forever. Release only deletes
//! the record when it still carries the handle's token.
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use rig_locker::{Locker, RetryPolicy, store::RedisLockStore};
//!
//! let store = RedisLockStore::connect("redis://127.0.0.1/").await?;
//! let locker = Locker::new(store, RetryPolicy::default())?;
//!
//! let handle = locker.acquire("orders:42", Duration::from_secs(10)).await?;
//! // critical section
//! locker.release(&handle).await?;
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod handle;
pub mod locker;
pub mod metrics;
pub mod store;

pub use config::{Backoff, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_TIMEOUT, RetryPolicy};
pub use context::{AcquireOptions, LockContext};
pub use error::{LockError, Result, StoreError};
pub use handle::{LockHandle, OwnershipToken};
pub use locker::Locker;
pub use metrics::LockMetrics;
pub use store::{AcquireOutcome, LockStore, MemoryLockStore, ReleaseOutcome};

#[cfg(feature = "redis-store")]
pub use store::RedisLockStore;
