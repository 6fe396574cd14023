use std::sync::Arc;

use serde::Deserialize;

use crate::{backends::MemoryKeyValueStore, r#trait::KeyValueStore};

/// Selection of the key-value store backing the quota engine
///
/// # Examples
///
/// Redis, shared by every processor instance:
/// ```ron
/// Warmup (
///     store: Redis((
///         url: "redis://127.0.0.1:6379/0",
///     )),
/// )
/// ```
///
/// In-process memory (single instance, state lost on restart):
/// ```ron
/// Warmup (
///     store: Memory,
/// )
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub enum StoreConfig {
    #[default]
    Memory,
    Redis(RedisConfig),
}

/// Connection settings for the Redis backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

impl StoreConfig {
    /// Build the configured store, connecting to it if it is remote.
    ///
    /// # Errors
    /// If the remote store cannot be reached, or if Redis is selected but
    /// the crate was built without the `redis` feature.
    pub async fn into_store(self) -> crate::Result<Arc<dyn KeyValueStore>> {
        match self {
            Self::Memory => Ok(Arc::new(MemoryKeyValueStore::new())),
            #[cfg(feature = "redis")]
            Self::Redis(config) => Ok(Arc::new(
                crate::backends::RedisKeyValueStore::connect(&config.url).await?,
            )),
            #[cfg(not(feature = "redis"))]
            Self::Redis(config) => Err(crate::QuotaError::Configuration(format!(
                "Redis store at {} requested, but redis support is not compiled in",
                config.url
            ))),
        }
    }
}
