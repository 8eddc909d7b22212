// Per-channel tick lock backed by Redis SET NX EX
//
// Every cadence tick wraps its read-decide-write sequence in this lock so
// two overlapping invocations of the same channel can never both read the
// send log and daily counts before either writes. A contended acquisition
// is not retried here: the tick reports Busy and the next external trigger
// is the retry.

use crate::db::RedisPool;
use crate::errors::StorageError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// RAII lease on a lock resource. Dropping the lease releases the lock.
pub trait LockLease: Send {}

/// Mutual-exclusion primitive serializing ticks per channel.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Attempt to acquire the lock once. Returns `None` when the resource
    /// is already held elsewhere.
    async fn try_acquire(
        &self,
        resource: &str,
        ttl: Duration,
    ) -> Result<Option<Box<dyn LockLease>>, StorageError>;
}

/// The lock resource name for a channel tick.
pub fn channel_resource(channel: crate::models::Channel) -> String {
    format!("cadence:{}", channel)
}

/// Redis implementation using SET NX EX with a per-lease token.
pub struct RedisLock {
    pool: RedisPool,
}

impl RedisLock {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DistributedLock for RedisLock {
    #[instrument(skip(self), fields(resource = %resource, ttl_seconds = ttl.as_secs()))]
    async fn try_acquire(
        &self,
        resource: &str,
        ttl: Duration,
    ) -> Result<Option<Box<dyn LockLease>>, StorageError> {
        let mut conn = self.pool.get_connection();
        let key = format!("lock:{}", resource);
        let token = Uuid::new_v4().to_string();

        // SET NX EX: atomically claim the key only if it does not exist
        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::RedisError(format!("Failed to acquire lock: {}", e)))?;

        if result.is_none() {
            debug!(resource = %resource, "Lock already held, not acquired");
            return Ok(None);
        }

        debug!(resource = %resource, token = %token, "Lock acquired");
        Ok(Some(Box::new(RedisLease {
            key,
            token,
            pool: self.pool.clone(),
        })))
    }
}

struct RedisLease {
    key: String,
    token: String,
    pool: RedisPool,
}

impl LockLease for RedisLease {}

impl Drop for RedisLease {
    fn drop(&mut self) {
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);
        let pool = self.pool.clone();

        tokio::spawn(async move {
            if let Err(e) = release(&pool, &key, &token).await {
                warn!(key = %key, error = %e, "Failed to release lock on drop");
            }
        });
    }
}

/// Delete the lock key only if this lease still owns it.
async fn release(pool: &RedisPool, key: &str, token: &str) -> Result<(), StorageError> {
    let mut conn = pool.get_connection();

    // Lua check-and-delete so an expired-and-reacquired lock is never
    // released by a stale lease
    let script = r#"
        if redis.call("get", KEYS[1]) == ARGV[1] then
            return redis.call("del", KEYS[1])
        else
            return 0
        end
    "#;

    let deleted: i32 = redis::Script::new(script)
        .key(key)
        .arg(token)
        .invoke_async(&mut conn)
        .await
        .map_err(|e| StorageError::RedisError(format!("Failed to release lock: {}", e)))?;

    if deleted == 1 {
        debug!(key = %key, "Lock released");
    } else {
        warn!(key = %key, "Lock was not owned or already expired");
    }

    Ok(())
}
