//! Daily quota scaling.
//!
//! Once per period the scheduler averages every tenant's scores from the
//! previous day, and scales up the current day's quota record for tenants
//! whose average clears the threshold. That is the record the processor
//! deducts from for the rest of the day.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};
use warmup_common::{QuotaDate, Signal, TenantId, internal};
use warmup_quota::QuotaEngine;

const fn default_interval() -> u64 {
    86400 // 24 hours
}

const fn default_score_threshold() -> f64 {
    0.8
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// How often to evaluate scores (in seconds). The first evaluation
    /// happens one full interval after startup.
    ///
    /// Default: 86400 seconds (24 hours)
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Minimum average score that earns a tenant a larger quota.
    ///
    /// Default: 0.8
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            score_threshold: default_score_threshold(),
        }
    }
}

/// Tenants by what one scheduler pass did for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Quota was scaled up.
    pub scaled: Vec<TenantId>,
    /// Scores were read but averaged below the threshold.
    pub unchanged: Vec<TenantId>,
    /// No scores, or the scores could not be read.
    pub skipped: Vec<TenantId>,
    /// Scaling was due but the quota could not be updated.
    pub failed: Vec<TenantId>,
}

enum Verdict {
    Scaled,
    Unchanged,
    Skipped,
    Failed,
}

#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    quota: QuotaEngine,
    tenants: Vec<TenantId>,
}

impl Scheduler {
    pub const fn new(config: SchedulerConfig, quota: QuotaEngine, tenants: Vec<TenantId>) -> Self {
        Self {
            config,
            quota,
            tenants,
        }
    }

    pub fn tenants(&self) -> &[TenantId] {
        &self.tenants
    }

    /// Evaluate every tenant once, scoring the day before `today` and scaling
    /// `today`'s quota.
    pub async fn run_once(&self, today: QuotaDate) -> RunReport {
        self.run_pass(today, None).await.0
    }

    /// Run a pass every `interval_secs` until shutdown is signalled.
    ///
    /// A shutdown during a pass lets the current tenant finish and skips the
    /// rest.
    pub async fn serve(&self, mut shutdown: broadcast::Receiver<Signal>) {
        internal!(
            level = INFO,
            "Scheduler starting, evaluating {} tenants every {}s",
            self.tenants.len(),
            self.config.interval_secs
        );

        let mut timer = tokio::time::interval(Duration::from_secs(self.config.interval_secs.max(1)));

        // Skip the first tick to avoid immediate execution
        timer.tick().await;

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let (report, interrupted) = self
                        .run_pass(QuotaDate::today(), Some(&mut shutdown))
                        .await;
                    info!(
                        scaled = report.scaled.len(),
                        unchanged = report.unchanged.len(),
                        skipped = report.skipped.len(),
                        failed = report.failed.len(),
                        "scheduler pass complete"
                    );

                    if interrupted {
                        internal!("Scheduler stopped during a pass");
                        break;
                    }
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!("Scheduler received shutdown signal");
                        }
                        Err(e) => {
                            error!("Scheduler shutdown channel error: {e}");
                        }
                    }
                    break;
                }
            }
        }

        internal!(level = INFO, "Scheduler shutdown complete");
    }

    /// Returns the report and whether the pass was cut short by shutdown.
    async fn run_pass(
        &self,
        today: QuotaDate,
        mut shutdown: Option<&mut broadcast::Receiver<Signal>>,
    ) -> (RunReport, bool) {
        let mut report = RunReport::default();

        for tenant in &self.tenants {
            if let Some(shutdown) = shutdown.as_deref_mut()
                && !matches!(shutdown.try_recv(), Err(TryRecvError::Empty))
            {
                return (report, true);
            }

            let bucket = match self.evaluate(tenant, today).await {
                Verdict::Scaled => &mut report.scaled,
                Verdict::Unchanged => &mut report.unchanged,
                Verdict::Skipped => &mut report.skipped,
                Verdict::Failed => &mut report.failed,
            };
            bucket.push(tenant.clone());
        }

        (report, false)
    }

    async fn evaluate(&self, tenant: &TenantId, today: QuotaDate) -> Verdict {
        let scored = today.previous();
        let scores = match self.quota.scores(tenant, scored).await {
            Ok(scores) if !scores.is_empty() => scores,
            Ok(_) => {
                debug!(tenant_id = %tenant, date = %scored, "no scores, skipping tenant");
                return Verdict::Skipped;
            }
            Err(e) => {
                warn!(tenant_id = %tenant, date = %scored, error = %e, "failed to read scores, skipping tenant");
                return Verdict::Skipped;
            }
        };

        let average = mean(&scores);
        if average < self.config.score_threshold {
            debug!(tenant_id = %tenant, average, "average below threshold");
            return Verdict::Unchanged;
        }

        match self.quota.increase_quota(tenant, today).await {
            Ok(quota) => {
                info!(tenant_id = %tenant, average, quota, "scaled quota for good score");
                Verdict::Scaled
            }
            Err(e) => {
                error!(tenant_id = %tenant, average, error = %e, "failed to increase quota");
                Verdict::Failed
            }
        }
    }
}

#[allow(
    clippy::cast_precision_loss,
    reason = "Scores are in [-3, 3] and logs are far shorter than 2^52 entries"
)]
fn mean(scores: &[i64]) -> f64 {
    scores.iter().sum::<i64>() as f64 / scores.len() as f64
}
