//! Redis lock store
//!
//! Acquire is `SET key token NX PX ttl`; release runs a Lua script so the
//! ownership check and the delete happen as one atomic step on the server.

use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use tracing::trace;

use super::{AcquireOutcome, LockStore, ReleaseOutcome};
use crate::error::StoreError;
use crate::handle::OwnershipToken;

/// Compare-and-delete on the owner token
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Lock store backed by a Redis server.
///
/// Cloning is cheap; clones share the multiplexed connection.
#[derive(Clone)]
pub struct RedisLockStore {
    conn: ConnectionManager,
    prefix: String,
    release_script: Script,
}

impl RedisLockStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            prefix: String::new(),
            release_script: Script::new(RELEASE_SCRIPT),
        }
    }

    /// Namespace every key, e.g. `rig:lock:`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl std::fmt::Debug for RedisLockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLockStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// PX takes whole milliseconds; sub-millisecond TTLs round up to 1.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn try_acquire(
        &self,
        key: &str,
        token: &OwnershipToken,
        ttl: Duration,
    ) -> Result<AcquireOutcome, StoreError> {
        let key = self.full_key(key);
        let mut conn = self.conn.clone();

        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(token.as_str())
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;

        trace!(key = %key, acquired = reply.is_some(), "SET NX reply");

        match reply.as_deref() {
            Some("OK") => Ok(AcquireOutcome::Acquired),
            None => Ok(AcquireOutcome::AlreadyHeld),
            Some(other) => Err(StoreError::UnexpectedReply(other.to_string())),
        }
    }

    async fn release(&self, key: &str, token: &OwnershipToken) -> Result<ReleaseOutcome, StoreError> {
        let key = self.full_key(key);
        let mut conn = self.conn.clone();

        let deleted: i64 = self
            .release_script
            .key(&key)
            .arg(token.as_str())
            .invoke_async(&mut conn)
            .await?;

        match deleted {
            1 => Ok(ReleaseOutcome::Released),
            0 => Ok(ReleaseOutcome::NotOwned),
            n => Err(StoreError::UnexpectedReply(format!(
                "release script returned {}",
                n
            ))),
        }
    }
}
