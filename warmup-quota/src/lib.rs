//! Quota engine for the warmup sender
//!
//! Per-tenant, per-day remaining counters and append-only score logs, kept in
//! an external key-value store so that every processor instance and the
//! scheduler observe the same state.
//!
//! - [`KeyValueStore`] is the storage seam: a handful of atomic primitives
//!   (`GET`, `SET EX`, `DECR`, `RPUSH`, `LRANGE`).
//! - [`QuotaEngine`] maps the quota operations onto those primitives.
//! - [`StoreConfig`] picks a backend at startup.

pub mod backends;
pub mod config;
pub mod engine;
pub mod error;
pub mod policy;
pub mod r#trait;

#[cfg(feature = "redis")]
pub use backends::RedisKeyValueStore;
pub use backends::{MemoryKeyValueStore, TestKeyValueStore};
pub use config::{RedisConfig, StoreConfig};
pub use engine::{Deduction, QuotaEngine, quota_key, score_key};
pub use error::{QuotaError, Result};
pub use policy::QuotaPolicy;
pub use r#trait::KeyValueStore;
