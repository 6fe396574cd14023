//! Sending with retry, then asking the channel what happened.

use tracing::{info, warn};
use warmup_common::{DeliveryOutcome, SendRequest};

use crate::{channel::DeliveryChannel, error::ChannelError, retry::RetryPolicy};

/// Try to send up to `policy.attempts()` times, sleeping between failed
/// attempts. Returns whether any attempt succeeded.
///
/// The sleep suspends only the calling task.
pub(super) async fn send_with_retry(
    channel: &dyn DeliveryChannel,
    policy: &RetryPolicy,
    from: &str,
    request: &SendRequest,
) -> bool {
    let mut delays = policy.delays();

    for attempt in 1..=policy.attempts() {
        info!(attempt, "send attempt");

        match channel
            .send(from, &request.to_address, &request.subject, &request.body)
            .await
        {
            Ok(()) => {
                info!(attempt, "send succeeded");
                return true;
            }
            Err(e) => {
                warn!(attempt, error = %e, "send failed");
                if let Some(delay) = delays.next() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    false
}

/// Probe bounce, open and spam status. A failed probe counts as the signal
/// being absent.
pub(super) async fn reconcile(
    channel: &dyn DeliveryChannel,
    request: &SendRequest,
    delivered: bool,
) -> DeliveryOutcome {
    let (to, subject, body) = (
        request.to_address.as_str(),
        request.subject.as_str(),
        request.body.as_str(),
    );

    let (bounced, opened, spam) = tokio::join!(
        channel.check_bounce(to, subject, body),
        channel.check_open(to, subject, body),
        channel.check_spam(to, subject, body),
    );

    let outcome = DeliveryOutcome {
        delivered,
        bounced: signal("bounce", bounced),
        opened: signal("open", opened),
        spam: signal("spam", spam),
    };

    info!(
        delivered = outcome.delivered,
        bounced = outcome.bounced,
        opened = outcome.opened,
        spam = outcome.spam,
        "status reconciled"
    );

    outcome
}

fn signal(check: &'static str, result: Result<bool, ChannelError>) -> bool {
    result.unwrap_or_else(|e| {
        warn!(check, error = %e, "status check failed");
        false
    })
}
