//! Key-value store implementations
//!
//! - `memory`: in-process store for development and tests
//! - `test`: memory store with failure injection and write notifications
//! - `redis`: Redis-backed store for production (feature `redis`)

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod test;

pub use memory::MemoryKeyValueStore;
#[cfg(feature = "redis")]
pub use redis::RedisKeyValueStore;
pub use test::TestKeyValueStore;
