//! Quota sizing rules.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::QuotaError;

/// How quota records are sized and how long they live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaPolicy {
    /// Units granted when a tenant's remaining quota is found exhausted or
    /// absent at check time.
    ///
    /// Default: 100
    #[serde(default = "defaults::reset_quota")]
    pub reset_quota: i64,

    /// Starting point for scaling when a tenant has no positive remaining
    /// count on the day being scaled.
    ///
    /// Default: 5
    #[serde(default = "defaults::base_quota")]
    pub base_quota: i64,

    /// Multiplier applied when a tenant's scores earn a larger quota. The
    /// product is truncated toward zero.
    ///
    /// Default: 1.5
    #[serde(default = "defaults::scale_factor")]
    pub scale_factor: f64,

    /// Lifetime of a quota record from its last reset (in seconds).
    ///
    /// Default: 86400 seconds (24 hours)
    #[serde(default = "defaults::record_ttl_secs")]
    pub record_ttl_secs: u64,

    /// Lifetime of a score log from its last append (in seconds). The
    /// scheduler reads the previous day's log, so this must cover at least
    /// one full day past the day the log belongs to.
    ///
    /// Default: 172800 seconds (48 hours)
    #[serde(default = "defaults::score_ttl_secs")]
    pub score_ttl_secs: u64,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            reset_quota: defaults::reset_quota(),
            base_quota: defaults::base_quota(),
            scale_factor: defaults::scale_factor(),
            record_ttl_secs: defaults::record_ttl_secs(),
            score_ttl_secs: defaults::score_ttl_secs(),
        }
    }
}

impl QuotaPolicy {
    #[must_use]
    pub const fn record_ttl(&self) -> Duration {
        Duration::from_secs(self.record_ttl_secs)
    }

    #[must_use]
    pub const fn score_ttl(&self) -> Duration {
        Duration::from_secs(self.score_ttl_secs)
    }

    /// Quota after scaling up from `current` remaining units.
    ///
    /// A non-positive `current` counts as unset and scales from
    /// `base_quota` instead.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        reason = "Quota counts are far below 2^52 and truncation is the intended rounding"
    )]
    pub fn scaled(&self, current: i64) -> i64 {
        let start = if current > 0 { current } else { self.base_quota };
        (start as f64 * self.scale_factor) as i64
    }

    /// Reject policies that would shrink or zero out quotas.
    ///
    /// # Errors
    /// If `scale_factor` is not a finite positive number, or if
    /// `reset_quota`, `base_quota`, `record_ttl_secs` or `score_ttl_secs` is
    /// not positive.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(QuotaError::Configuration(format!(
                "scale_factor must be a positive number, got {}",
                self.scale_factor
            )));
        }

        if self.reset_quota <= 0 || self.base_quota <= 0 {
            return Err(QuotaError::Configuration(format!(
                "reset_quota and base_quota must be positive, got {} and {}",
                self.reset_quota, self.base_quota
            )));
        }

        if self.record_ttl_secs == 0 || self.score_ttl_secs == 0 {
            return Err(QuotaError::Configuration(
                "record_ttl_secs and score_ttl_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

mod defaults {
    pub const fn reset_quota() -> i64 {
        100
    }

    pub const fn base_quota() -> i64 {
        5
    }

    pub const fn scale_factor() -> f64 {
        1.5
    }

    pub const fn record_ttl_secs() -> u64 {
        86400 // 24 hours
    }

    pub const fn score_ttl_secs() -> u64 {
        172_800 // 48 hours
    }
}
