//! Retry policy for sending a single message.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How hard a worker tries to send one message before giving up on it.
///
/// Delays double after every failed attempt, starting from
/// `initial_delay_millis`. There is no sleep after the final attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    ///
    /// Default: 3 (four attempts in total)
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry (in milliseconds).
    ///
    /// Default: 1000 milliseconds (1 second)
    #[serde(default = "defaults::initial_delay_millis")]
    pub initial_delay_millis: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            initial_delay_millis: defaults::initial_delay_millis(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Delays beyond u64 milliseconds are not meaningful"
    )]
    pub const fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay_millis: initial_delay.as_millis() as u64,
        }
    }

    /// Total number of send attempts.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_millis)
    }

    /// Sleep durations between consecutive attempts, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        std::iter::successors(Some(self.initial_delay()), |delay| {
            Some(delay.saturating_mul(2))
        })
        .take(self.max_retries as usize)
    }
}

mod defaults {
    pub const fn max_retries() -> u32 {
        3
    }

    pub const fn initial_delay_millis() -> u64 {
        1000 // 1 second
    }
}
