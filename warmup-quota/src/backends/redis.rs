use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::warn;

use crate::r#trait::KeyValueStore;

/// Redis-backed key-value store
///
/// Maps each primitive onto the Redis command of the same shape: `GET`,
/// `SET ... EX`, `DECR`, `RPUSH`, `LRANGE 0 -1` and `EXPIRE`. All of them are
/// atomic on the server, so any number of processor instances may share one
/// Redis. `expire_if_unset` uses `EXPIRE ... NX`, which needs Redis 7.
///
/// The connection manager reconnects transparently; a command issued while
/// the connection is down fails and is reported to the caller.
#[derive(Clone)]
pub struct RedisKeyValueStore {
    manager: ConnectionManager,
}

impl std::fmt::Debug for RedisKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKeyValueStore").finish_non_exhaustive()
    }
}

fn seconds(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
}

impl RedisKeyValueStore {
    /// Connect to the Redis server at `url` (`redis://host:port/db`).
    ///
    /// # Errors
    /// If the URL is invalid or the first connection attempt fails.
    pub async fn connect(url: &str) -> crate::Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> crate::Result<Option<i64>> {
        let mut conn = self.manager.clone();
        let value: Option<i64> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: i64, ttl: Duration) -> crate::Result<()> {
        let mut conn = self.manager.clone();
        let () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn decr(&self, key: &str) -> crate::Result<i64> {
        let mut conn = self.manager.clone();
        let value: i64 = conn.decr(key, 1).await?;
        Ok(value)
    }

    async fn rpush(&self, key: &str, value: i64) -> crate::Result<()> {
        let mut conn = self.manager.clone();
        let () = conn.rpush(key, value).await?;
        Ok(())
    }

    async fn lrange(&self, key: &str) -> crate::Result<Vec<i64>> {
        let mut conn = self.manager.clone();
        let raw: Vec<String> = conn.lrange(key, 0, -1).await?;

        Ok(raw
            .into_iter()
            .filter_map(|entry| match entry.parse() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, entry = %entry, error = %e, "Skipping non-integer list entry");
                    None
                }
            })
            .collect())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> crate::Result<bool> {
        let mut conn = self.manager.clone();
        let applied: bool = conn.expire(key, seconds(ttl)).await?;
        Ok(applied)
    }

    async fn expire_if_unset(&self, key: &str, ttl: Duration) -> crate::Result<bool> {
        let mut conn = self.manager.clone();
        let applied: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds(ttl))
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(applied == 1)
    }
}
