use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::memory::MemoryKeyValueStore;
use crate::{QuotaError, r#trait::KeyValueStore};

#[derive(Debug, Default)]
struct Failures {
    reads: bool,
    writes: bool,
    keys: Vec<String>,
}

/// Testing wrapper around [`MemoryKeyValueStore`]
///
/// Adds failure injection (all reads, all writes, or every operation on keys
/// containing a pattern) and lets tests wait for writes to land.
#[derive(Debug, Clone, Default)]
pub struct TestKeyValueStore {
    inner: MemoryKeyValueStore,
    failures: Arc<Mutex<Failures>>,
    writes: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl TestKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying memory store, bypassing failure injection.
    #[must_use]
    pub const fn inner(&self) -> &MemoryKeyValueStore {
        &self.inner
    }

    /// Make every `get`/`lrange` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.failures.lock().reads = fail;
    }

    /// Make every `set_ex`/`decr`/`rpush` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.failures.lock().writes = fail;
    }

    /// Make every operation on a key containing `pattern` fail.
    pub fn fail_keys_containing(&self, pattern: impl Into<String>) {
        self.failures.lock().keys.push(pattern.into());
    }

    pub fn clear_failures(&self) {
        *self.failures.lock() = Failures::default();
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Wait until at least `expected` writes have succeeded.
    ///
    /// # Errors
    /// If `timeout` elapses first.
    pub async fn wait_for_writes(&self, expected: usize, timeout: Duration) -> crate::Result<()> {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                if self.write_count() >= expected {
                    return;
                }
                notified.await;
            }
        })
        .await
        .map_err(|e| QuotaError::Backend(format!("Timeout waiting for writes: {e}")))
    }

    fn check(&self, key: &str, write: bool) -> crate::Result<()> {
        let failures = self.failures.lock();
        let blanket = if write { failures.writes } else { failures.reads };

        if blanket || failures.keys.iter().any(|pattern| key.contains(pattern)) {
            return Err(QuotaError::Injected(key.to_string()));
        }

        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl KeyValueStore for TestKeyValueStore {
    async fn get(&self, key: &str) -> crate::Result<Option<i64>> {
        self.check(key, false)?;
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: i64, ttl: Duration) -> crate::Result<()> {
        self.check(key, true)?;
        self.inner.set_ex(key, value, ttl).await?;
        self.record_write();
        Ok(())
    }

    async fn decr(&self, key: &str) -> crate::Result<i64> {
        self.check(key, true)?;
        let value = self.inner.decr(key).await?;
        self.record_write();
        Ok(value)
    }

    async fn rpush(&self, key: &str, value: i64) -> crate::Result<()> {
        self.check(key, true)?;
        self.inner.rpush(key, value).await?;
        self.record_write();
        Ok(())
    }

    async fn lrange(&self, key: &str) -> crate::Result<Vec<i64>> {
        self.check(key, false)?;
        self.inner.lrange(key).await
    }

    // Lifetime changes are not counted as writes
    async fn expire(&self, key: &str, ttl: Duration) -> crate::Result<bool> {
        self.check(key, true)?;
        self.inner.expire(key, ttl).await
    }

    async fn expire_if_unset(&self, key: &str, ttl: Duration) -> crate::Result<bool> {
        self.check(key, true)?;
        self.inner.expire_if_unset(key, ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_failures_by_kind() {
        let store = TestKeyValueStore::new();
        store.fail_writes(true);

        assert!(store.rpush("k", 1).await.unwrap_err().is_injected());
        assert_eq!(store.lrange("k").await.unwrap(), Vec::<i64>::new());

        store.fail_writes(false);
        store.fail_reads(true);
        store.rpush("k", 1).await.unwrap();
        assert!(store.lrange("k").await.unwrap_err().is_injected());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures_by_key() {
        let store = TestKeyValueStore::new();
        store.fail_keys_containing(":globex:");

        assert!(store.decr("quota:globex:2024-01-01").await.is_err());
        assert_eq!(store.decr("quota:acme:2024-01-01").await.unwrap(), -1);

        store.clear_failures();
        assert_eq!(store.decr("quota:globex:2024-01-01").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_wait_for_writes() {
        let store = TestKeyValueStore::new();
        let writer = store.clone();
        tokio::spawn(async move {
            writer.rpush("k", 1).await.unwrap();
            writer.rpush("k", 2).await.unwrap();
        });

        store
            .wait_for_writes(2, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(store.inner().lrange("k").await.unwrap(), vec![1, 2]);
    }
}
