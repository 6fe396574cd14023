//! Error types for the warmup-quota crate.

use thiserror::Error;

/// Failure of a quota store operation.
#[derive(Debug, Error)]
pub enum QuotaError {
    /// The backing store rejected or failed the operation.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Redis returned an error or the connection failed.
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The key holds a counter where a list was expected, or vice versa.
    #[error("Key {0} holds the wrong kind of value")]
    WrongType(String),

    /// Invalid store configuration or quota policy.
    #[error("Invalid quota configuration: {0}")]
    Configuration(String),

    /// Failure injected by the test store.
    #[error("Injected failure for key {0}")]
    Injected(String),
}

impl QuotaError {
    /// Returns `true` if this failure was injected by [`crate::TestKeyValueStore`].
    #[must_use]
    pub const fn is_injected(&self) -> bool {
        matches!(self, Self::Injected(_))
    }
}

/// Specialized `Result` type for quota operations.
pub type Result<T> = std::result::Result<T, QuotaError>;
