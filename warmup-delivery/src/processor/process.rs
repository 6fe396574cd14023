//! The per-event handling contract.

use tracing::{Instrument, info, info_span, warn};
use ulid::Ulid;
use warmup_common::{QuotaDate, Score, SendRequest};

use super::{HandleOutcome, WarmupProcessor, send};
use crate::error::ProcessError;

impl WarmupProcessor {
    /// Run one request through validation, the quota gate, sending and
    /// scoring.
    ///
    /// A rejected recipient is a success ([`HandleOutcome::Dropped`]). So is
    /// a message that could not be sent after every retry: it is scored as
    /// not delivered. Quota store failures are logged and otherwise ignored.
    ///
    /// # Errors
    /// If the tenant has no sender address or no usable delivery channel.
    /// The event should then be redelivered.
    pub async fn handle(&self, request: &SendRequest) -> Result<HandleOutcome, ProcessError> {
        let span = info_span!(
            "event",
            event_id = %Ulid::new(),
            tenant_id = %request.tenant_id,
            to = %request.to_address,
            subject = %request.subject,
        );

        self.handle_in_span(request, QuotaDate::today())
            .instrument(span)
            .await
    }

    async fn handle_in_span(
        &self,
        request: &SendRequest,
        today: QuotaDate,
    ) -> Result<HandleOutcome, ProcessError> {
        let tenant = &request.tenant_id;
        info!("received");

        if !self.validator.is_valid(&request.to_address) {
            info!("recipient rejected, skipping");
            return Ok(HandleOutcome::Dropped);
        }
        info!("validation passed");

        // Advisory only: concurrent workers may all pass this check before
        // any of them deducts.
        let remaining = self.quota.remaining(tenant, today).await.unwrap_or_else(|e| {
            warn!(error = %e, "failed to read quota, treating it as exhausted");
            0
        });

        let remaining = if remaining > 0 {
            remaining
        } else {
            let reset_to = self.quota.policy().reset_quota;
            match self.quota.reset(tenant, today, reset_to).await {
                Ok(()) => {
                    info!(reset_to, "quota reset");
                    reset_to
                }
                Err(e) => {
                    warn!(error = %e, "failed to reset quota");
                    remaining
                }
            }
        };
        info!(remaining, "quota checked");

        let from = self.resolver.resolve(tenant).await.inspect_err(|e| {
            warn!(error = %e, "sender address resolution failed");
        })?;

        let channel = self.channels.select(tenant).inspect_err(|e| {
            warn!(error = %e, "delivery channel selection failed");
        })?;

        let delivered =
            send::send_with_retry(channel.as_ref(), &self.config.retry, &from, request).await;

        let outcome = send::reconcile(channel.as_ref(), request, delivered).await;
        let score = Score::from_outcome(&outcome);

        match self.quota.save_score(tenant, today, score).await {
            Ok(()) => info!(%score, "score saved"),
            Err(e) => warn!(%score, error = %e, "failed to save score"),
        }

        let remaining = match self.quota.deduct(tenant, today).await {
            Ok(deduction) => {
                info!(
                    remaining = deduction.remaining,
                    within_quota = deduction.within_quota,
                    "quota deducted"
                );
                Some(deduction.remaining)
            }
            Err(e) => {
                warn!(error = %e, "failed to deduct quota");
                None
            }
        };

        info!("done");
        Ok(HandleOutcome::Processed {
            outcome,
            score,
            remaining,
        })
    }
}
