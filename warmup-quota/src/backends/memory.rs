use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::{QuotaError, r#trait::KeyValueStore};

#[derive(Debug, Clone)]
enum Slot {
    Counter(i64),
    List(Vec<i64>),
}

#[derive(Debug, Clone)]
struct Entry {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl Entry {
    const fn new(slot: Slot) -> Self {
        Self {
            slot,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory key-value store
///
/// Counters and lists live in a `DashMap`. Either kind of key may carry a
/// lifetime. Expiry is lazy: an expired key is treated as absent the next
/// time it is touched and removed then.
///
/// # Concurrency
/// `decr` and `rpush` run under the map's per-shard entry lock, so they are
/// linearizable per key, matching what Redis gives for `DECR`/`RPUSH`. Only
/// processes sharing this value see the same counters; use the Redis backend
/// when several processor instances must share quota state.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held, including expired ones not yet
    /// evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every key.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Time left before `key` expires, if it has a lifetime.
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .filter(|at| *at > now)
            .map(|at| at - now)
    }

    fn evict_if_expired(&self, key: &str, now: Instant) {
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
    }

    fn set_expiry(&self, key: &str, ttl: Duration, replace: bool) -> bool {
        let now = Instant::now();
        self.evict_if_expired(key, now);

        match self.entries.get_mut(key) {
            Some(mut entry) if replace || entry.expires_at.is_none() => {
                entry.expires_at = Some(now + ttl);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> crate::Result<Option<i64>> {
        let now = Instant::now();

        let current = match self.entries.get(key).as_deref() {
            None => return Ok(None),
            Some(entry) if entry.is_expired(now) => None,
            Some(Entry {
                slot: Slot::Counter(value),
                ..
            }) => Some(*value),
            Some(_) => return Err(QuotaError::WrongType(key.to_string())),
        };

        if current.is_none() {
            self.evict_if_expired(key, now);
        }

        Ok(current)
    }

    async fn set_ex(&self, key: &str, value: i64, ttl: Duration) -> crate::Result<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                slot: Slot::Counter(value),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn decr(&self, key: &str) -> crate::Result<i64> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Slot::Counter(0)));

        if entry.is_expired(now) {
            *entry = Entry::new(Slot::Counter(0));
        }

        match &mut entry.slot {
            Slot::Counter(value) => {
                *value -= 1;
                Ok(*value)
            }
            Slot::List(_) => Err(QuotaError::WrongType(key.to_string())),
        }
    }

    async fn rpush(&self, key: &str, value: i64) -> crate::Result<()> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Slot::List(Vec::new())));

        if entry.is_expired(now) {
            *entry = Entry::new(Slot::List(Vec::new()));
        }

        match &mut entry.slot {
            Slot::List(values) => {
                values.push(value);
                Ok(())
            }
            Slot::Counter(_) => Err(QuotaError::WrongType(key.to_string())),
        }
    }

    async fn lrange(&self, key: &str) -> crate::Result<Vec<i64>> {
        let now = Instant::now();
        match self.entries.get(key).as_deref() {
            None => Ok(Vec::new()),
            Some(entry) if entry.is_expired(now) => Ok(Vec::new()),
            Some(Entry {
                slot: Slot::List(values),
                ..
            }) => Ok(values.clone()),
            Some(_) => Err(QuotaError::WrongType(key.to_string())),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> crate::Result<bool> {
        Ok(self.set_expiry(key, ttl, true))
    }

    async fn expire_if_unset(&self, key: &str, ttl: Duration) -> crate::Result<bool> {
        Ok(self.set_expiry(key, ttl, false))
    }
}
