//! Quota operations on top of a [`KeyValueStore`].

use std::sync::Arc;

use tracing::{debug, warn};
use warmup_common::{QuotaDate, Score, TenantId};

use crate::{QuotaPolicy, r#trait::KeyValueStore};

/// Store key of the remaining-quota counter for a tenant and day.
#[must_use]
pub fn quota_key(tenant: &TenantId, date: QuotaDate) -> String {
    format!("quota:{tenant}:{date}")
}

/// Store key of the score log for a tenant and day.
#[must_use]
pub fn score_key(tenant: &TenantId, date: QuotaDate) -> String {
    format!("score:{tenant}:{date}")
}

/// Result of deducting one unit of quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deduction {
    /// `false` if the deduction took the counter below zero.
    pub within_quota: bool,
    pub remaining: i64,
}

/// Per-tenant, per-day quota counters and score logs.
///
/// Cheap to clone; clones share the same store.
#[derive(Debug, Clone)]
pub struct QuotaEngine {
    store: Arc<dyn KeyValueStore>,
    policy: QuotaPolicy,
}

impl QuotaEngine {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: QuotaPolicy) -> Self {
        Self { store, policy }
    }

    pub const fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Remaining units for `tenant` on `date`, or 0 if there is no live record.
    ///
    /// # Errors
    /// If the store cannot be read.
    pub async fn remaining(&self, tenant: &TenantId, date: QuotaDate) -> crate::Result<i64> {
        Ok(self
            .store
            .get(&quota_key(tenant, date))
            .await?
            .unwrap_or_default())
    }

    /// Set the remaining count to `count` with a fresh lifetime.
    ///
    /// # Errors
    /// If the store cannot be written.
    pub async fn reset(&self, tenant: &TenantId, date: QuotaDate, count: i64) -> crate::Result<()> {
        self.store
            .set_ex(&quota_key(tenant, date), count, self.policy.record_ttl())
            .await?;

        debug!(tenant_id = %tenant, %date, count, "quota reset");
        Ok(())
    }

    /// Take one unit of quota in a single atomic decrement.
    ///
    /// A record created by the decrement itself gets the usual record
    /// lifetime, so it cannot outlive its day.
    ///
    /// # Errors
    /// If the store cannot be written.
    pub async fn deduct(&self, tenant: &TenantId, date: QuotaDate) -> crate::Result<Deduction> {
        let key = quota_key(tenant, date);
        let remaining = self.store.decr(&key).await?;

        if let Err(e) = self
            .store
            .expire_if_unset(&key, self.policy.record_ttl())
            .await
        {
            warn!(tenant_id = %tenant, %date, error = %e, "failed to bound quota record lifetime");
        }

        Ok(Deduction {
            within_quota: remaining >= 0,
            remaining,
        })
    }

    /// Append `score` to the tenant's log for `date` and extend the log's
    /// lifetime to the policy's `score_ttl`.
    ///
    /// # Errors
    /// If the store cannot be written.
    pub async fn save_score(
        &self,
        tenant: &TenantId,
        date: QuotaDate,
        score: Score,
    ) -> crate::Result<()> {
        let key = score_key(tenant, date);
        self.store.rpush(&key, i64::from(score)).await?;
        self.store.expire(&key, self.policy.score_ttl()).await?;
        Ok(())
    }

    /// Every score saved for `tenant` on `date`, in the order they were saved.
    ///
    /// # Errors
    /// If the store cannot be read.
    pub async fn scores(&self, tenant: &TenantId, date: QuotaDate) -> crate::Result<Vec<i64>> {
        self.store.lrange(&score_key(tenant, date)).await
    }

    /// Scale the tenant's quota for `date` by the policy's scale factor and
    /// return the new count.
    ///
    /// A missing or exhausted record scales from `base_quota`. The record
    /// gets a fresh lifetime.
    ///
    /// # Errors
    /// If the store cannot be read or written.
    pub async fn increase_quota(&self, tenant: &TenantId, date: QuotaDate) -> crate::Result<i64> {
        let current = self.remaining(tenant, date).await?;
        let scaled = self.policy.scaled(current);

        self.reset(tenant, date, scaled).await?;
        Ok(scaled)
    }
}
