// In-process lock store
// Same set-if-absent / compare-and-delete contract as the Redis store, for
// single-process deployments and tests

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::{AcquireOutcome, LockStore, ReleaseOutcome};
use crate::error::StoreError;
use crate::handle::OwnershipToken;

/// A live lock record
#[derive(Debug, Clone)]
struct LockRecord {
    token: OwnershipToken,
    // None when the ttl runs past the clock's range
    expires_at: Option<Instant>,
}

impl LockRecord {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory lock store backed by DashMap.
///
/// Expired records are treated as absent on every read; `spawn_cleanup` only
/// reclaims their memory. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockStore {
    records: Arc<DashMap<String, LockRecord>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a background task purging expired records every `interval`.
    ///
    /// The task stops once every clone of the store has been dropped.
    pub fn spawn_cleanup(&self, interval: Duration) -> JoinHandle<()> {
        let records: Weak<DashMap<String, LockRecord>> = Arc::downgrade(&self.records);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(records) = records.upgrade() else {
                    break;
                };
                let purged = purge(&records);
                if purged > 0 {
                    debug!(count = purged, "Cleaned up expired lock records");
                }
            }
        })
    }

    /// Remove expired records now, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        purge(&self.records)
    }

    /// Current owner of a live record
    pub fn owner(&self, key: &str) -> Option<OwnershipToken> {
        let now = Instant::now();
        self.records
            .get(key)
            .filter(|record| !record.is_expired(now))
            .map(|record| record.token.clone())
    }

    /// Number of stored records, expired ones included until purged
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn purge(records: &DashMap<String, LockRecord>) -> usize {
    let now = Instant::now();
    let before = records.len();
    records.retain(|_, record| !record.is_expired(now));
    before.saturating_sub(records.len())
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn try_acquire(
        &self,
        key: &str,
        token: &OwnershipToken,
        ttl: Duration,
    ) -> Result<AcquireOutcome, StoreError> {
        let now = Instant::now();
        let record = LockRecord {
            token: token.clone(),
            expires_at: now.checked_add(ttl),
        };

        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired(now) {
                    return Ok(AcquireOutcome::AlreadyHeld);
                }
                occupied.insert(record);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record);
            }
        }
        Ok(AcquireOutcome::Acquired)
    }

    async fn release(&self, key: &str, token: &OwnershipToken) -> Result<ReleaseOutcome, StoreError> {
        let now = Instant::now();
        let removed = self
            .records
            .remove_if(key, |_, record| !record.is_expired(now) && &record.token == token);

        Ok(match removed {
            Some(_) => ReleaseOutcome::Released,
            None => ReleaseOutcome::NotOwned,
        })
    }
}
