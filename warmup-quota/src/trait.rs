use std::time::Duration;

use async_trait::async_trait;

/// The external key-value store holding quota counters and score logs.
///
/// Every method must be a single atomic operation against the store. In
/// particular [`decr`](Self::decr) must not be implemented as a read followed
/// by a write, since concurrent workers deduct from the same key.
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read an integer counter. `None` if the key is absent or has expired.
    ///
    /// # Errors
    /// If the store cannot be reached or the key holds a list.
    async fn get(&self, key: &str) -> crate::Result<Option<i64>>;

    /// Set an integer counter, replacing any existing value and expiring it
    /// after `ttl`.
    ///
    /// # Errors
    /// If the store cannot be reached.
    async fn set_ex(&self, key: &str, value: i64, ttl: Duration) -> crate::Result<()>;

    /// Atomically decrement a counter by one and return the new value. An
    /// absent key is treated as zero, so the first decrement yields `-1`.
    ///
    /// # Errors
    /// If the store cannot be reached or the key holds a list.
    async fn decr(&self, key: &str) -> crate::Result<i64>;

    /// Append a value to the end of a list, creating the list if needed.
    ///
    /// # Errors
    /// If the store cannot be reached or the key holds a counter.
    async fn rpush(&self, key: &str, value: i64) -> crate::Result<()>;

    /// Read a whole list in insertion order. An absent key yields an empty
    /// list.
    ///
    /// # Errors
    /// If the store cannot be reached or the key holds a counter.
    async fn lrange(&self, key: &str) -> crate::Result<Vec<i64>>;

    /// Expire `key` after `ttl`, replacing any lifetime it already had.
    /// Returns `false` if the key does not exist.
    ///
    /// # Errors
    /// If the store cannot be reached.
    async fn expire(&self, key: &str, ttl: Duration) -> crate::Result<bool>;

    /// Expire `key` after `ttl` only if it has no lifetime yet. Returns
    /// `false` if the key does not exist or already expires.
    ///
    /// # Errors
    /// If the store cannot be reached.
    async fn expire_if_unset(&self, key: &str, ttl: Duration) -> crate::Result<bool>;
}
