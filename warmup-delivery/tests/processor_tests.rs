//! Integration tests for the per-event handling contract
#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use std::{io, sync::Arc, time::Duration};

use parking_lot::Mutex;
use support::{ACME, DISPOSABLE, GLOBEX, INITECH, RecordingChannel, SENDER, harness, retry};
use warmup_common::{DeliveryOutcome, QuotaDate, SendRequest, TenantId};
use warmup_delivery::{
    ChannelError, ChannelKind, HandleOutcome, ProcessError, Scheduler, SchedulerConfig,
};
use warmup_quota::{KeyValueStore, score_key};

fn request(tenant: &str, to: &str) -> SendRequest {
    SendRequest::new(tenant, to, "Warming up", "Hello there")
}

fn no_retry() -> warmup_delivery::RetryPolicy {
    retry(0, Duration::ZERO)
}

/// Formatted log output, shared with the subscriber that writes it.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines_containing(&self, needle: &str) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

async fn score_of(channel: RecordingChannel) -> i8 {
    let h = harness(channel, no_retry());
    match h.processor.handle(&request(ACME, "bob@example.com")).await.unwrap() {
        HandleOutcome::Processed { score, .. } => score.value(),
        HandleOutcome::Dropped => panic!("request was dropped"),
    }
}

#[tokio::test]
async fn test_rejected_recipient_is_dropped_without_sending() {
    let h = harness(RecordingChannel::new(), no_retry());
    let tenant = TenantId::from(ACME);
    let today = QuotaDate::today();

    let outcome = h
        .processor
        .handle(&request(ACME, &format!("bob@{DISPOSABLE}")))
        .await
        .unwrap();

    assert_eq!(outcome, HandleOutcome::Dropped);
    assert_eq!(h.channel.send_count(), 0);
    assert!(h.quota.scores(&tenant, today).await.unwrap().is_empty());
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn test_malformed_recipient_is_dropped() {
    let h = harness(RecordingChannel::new(), no_retry());

    let outcome = h.processor.handle(&request(ACME, "not-an-address")).await.unwrap();
    assert_eq!(outcome, HandleOutcome::Dropped);
    assert_eq!(h.channel.send_count(), 0);
}

#[tokio::test]
async fn test_exhausted_quota_is_reset_before_deduction() {
    let h = harness(RecordingChannel::new(), no_retry());
    let tenant = TenantId::from(ACME);

    let outcome = h.processor.handle(&request(ACME, "bob@example.com")).await.unwrap();

    let HandleOutcome::Processed { remaining, .. } = outcome else {
        panic!("expected the request to be processed");
    };
    assert_eq!(remaining, Some(99));
    assert_eq!(
        h.quota.remaining(&tenant, QuotaDate::today()).await.unwrap(),
        99
    );
}

#[tokio::test]
async fn test_quota_check_logs_the_count_after_reset() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let h = harness(RecordingChannel::new(), no_retry());
    h.quota
        .reset(&TenantId::from(ACME), QuotaDate::today(), 0)
        .await
        .unwrap();
    h.processor.handle(&request(ACME, "bob@example.com")).await.unwrap();

    let checked = logs.lines_containing("quota checked");
    assert_eq!(checked.len(), 1, "{checked:?}");
    assert!(checked[0].contains("remaining=100"), "{}", checked[0]);
}

#[tokio::test]
async fn test_positive_quota_is_not_reset() {
    let h = harness(RecordingChannel::new(), no_retry());
    let tenant = TenantId::from(ACME);
    h.quota.reset(&tenant, QuotaDate::today(), 3).await.unwrap();

    let outcome = h.processor.handle(&request(ACME, "bob@example.com")).await.unwrap();

    assert!(matches!(
        outcome,
        HandleOutcome::Processed {
            remaining: Some(2),
            ..
        }
    ));
}

#[tokio::test]
async fn test_scheduled_scaling_is_spent_by_todays_sends() {
    let h = harness(RecordingChannel::new(), no_retry());
    let tenant = TenantId::from(ACME);
    let today = QuotaDate::today();
    for score in [2, 2, 2, 2] {
        h.store
            .inner()
            .rpush(&score_key(&tenant, today.previous()), score)
            .await
            .unwrap();
    }

    let scheduler = Scheduler::new(
        SchedulerConfig::default(),
        h.quota.clone(),
        vec![tenant.clone()],
    );
    assert_eq!(scheduler.run_once(today).await.scaled, vec![tenant.clone()]);

    let outcome = h.processor.handle(&request(ACME, "bob@example.com")).await.unwrap();

    // Scaled from the base of 5 to 7, then one unit spent
    assert!(matches!(
        outcome,
        HandleOutcome::Processed {
            remaining: Some(6),
            ..
        }
    ));
    assert_eq!(h.quota.remaining(&tenant, today).await.unwrap(), 6);
}

#[tokio::test]
async fn test_quota_gate_is_advisory() {
    let h = harness(RecordingChannel::new(), no_retry());
    let tenant = TenantId::from(ACME);
    h.quota.reset(&tenant, QuotaDate::today(), 1).await.unwrap();

    h.processor.handle(&request(ACME, "a@example.com")).await.unwrap();
    // Remaining is now 0, so the next check resets it
    let outcome = h.processor.handle(&request(ACME, "b@example.com")).await.unwrap();

    assert!(matches!(
        outcome,
        HandleOutcome::Processed {
            remaining: Some(99),
            ..
        }
    ));
    assert_eq!(h.channel.send_count(), 2);
}

#[tokio::test]
async fn test_scores_follow_outcome_flags() {
    // delivered + opened
    assert_eq!(
        score_of(RecordingChannel::new().with_signals(false, true, false)).await,
        3
    );
    // not delivered + bounced
    assert_eq!(
        score_of(
            RecordingChannel::new()
                .always_failing()
                .with_signals(true, false, false)
        )
        .await,
        -1
    );
    // not delivered + spam
    assert_eq!(
        score_of(
            RecordingChannel::new()
                .always_failing()
                .with_signals(false, false, true)
        )
        .await,
        -2
    );
    // delivered + spam
    assert_eq!(
        score_of(RecordingChannel::new().with_signals(false, false, true)).await,
        0
    );
    // delivered and bounced: bounce is ignored once delivered
    assert_eq!(
        score_of(RecordingChannel::new().with_signals(true, false, false)).await,
        2
    );
}

#[tokio::test]
async fn test_score_is_saved_for_today() {
    let h = harness(
        RecordingChannel::new().with_signals(false, true, false),
        no_retry(),
    );
    let tenant = TenantId::from(ACME);

    h.processor.handle(&request(ACME, "a@example.com")).await.unwrap();
    h.processor.handle(&request(ACME, "b@example.com")).await.unwrap();

    assert_eq!(
        h.quota.scores(&tenant, QuotaDate::today()).await.unwrap(),
        vec![3, 3]
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_timing() {
    let h = harness(
        RecordingChannel::new().always_failing(),
        retry(3, Duration::from_secs(1)),
    );

    let outcome = h.processor.handle(&request(ACME, "bob@example.com")).await.unwrap();

    let HandleOutcome::Processed { outcome, score, .. } = outcome else {
        panic!("expected the request to be processed");
    };
    assert!(!outcome.delivered);
    assert_eq!(score.value(), 0);

    let sends = h.channel.sends();
    assert_eq!(sends.len(), 4);

    let gaps: Vec<Duration> = sends.windows(2).map(|w| w[1].at - w[0].at).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_stops_on_first_success() {
    let h = harness(
        RecordingChannel::new().failing_first(2),
        retry(3, Duration::from_secs(1)),
    );

    let outcome = h.processor.handle(&request(ACME, "bob@example.com")).await.unwrap();

    assert!(matches!(
        outcome,
        HandleOutcome::Processed {
            outcome: DeliveryOutcome {
                delivered: true,
                ..
            },
            ..
        }
    ));
    assert_eq!(h.channel.send_count(), 3);
}

#[tokio::test]
async fn test_send_uses_resolved_sender() {
    let h = harness(RecordingChannel::new(), no_retry());
    h.processor.handle(&request(ACME, "bob@example.com")).await.unwrap();

    let sends = h.channel.sends();
    assert_eq!(sends[0].from, SENDER);
    assert_eq!(sends[0].to, "bob@example.com");
    assert_eq!(sends[0].subject, "Warming up");
}

#[tokio::test]
async fn test_unresolvable_sender_is_an_error() {
    let h = harness(RecordingChannel::new(), no_retry());

    let err = h
        .processor
        .handle(&request(INITECH, "bob@example.com"))
        .await
        .unwrap_err();

    assert!(err.is_resolution());
    assert_eq!(h.channel.send_count(), 0);
    assert!(
        h.quota
            .scores(&INITECH.into(), QuotaDate::today())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_unsupported_channel_is_an_error() {
    let h = harness(RecordingChannel::new(), no_retry());

    let err = h
        .processor
        .handle(&request(GLOBEX, "bob@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProcessError::ChannelSelection(ChannelError::Unsupported(ChannelKind::Outlook))
    ));
}

#[tokio::test]
async fn test_unknown_tenant_is_an_error() {
    let h = harness(RecordingChannel::new(), no_retry());

    let err = h
        .processor
        .handle(&request("umbrella", "bob@example.com"))
        .await
        .unwrap_err();

    assert!(err.is_resolution() || err.is_channel_selection());
}

#[tokio::test]
async fn test_failed_probes_count_as_absent() {
    let h = harness(
        RecordingChannel::new()
            .with_signals(true, true, true)
            .failing_checks(),
        no_retry(),
    );

    let outcome = h.processor.handle(&request(ACME, "bob@example.com")).await.unwrap();

    assert!(matches!(
        outcome,
        HandleOutcome::Processed {
            outcome: DeliveryOutcome {
                delivered: true,
                bounced: false,
                opened: false,
                spam: false,
            },
            ..
        }
    ));
}

#[tokio::test]
async fn test_store_failures_while_recording_are_not_errors() {
    let h = harness(RecordingChannel::new(), no_retry());
    h.store.fail_keys_containing("score:");

    let outcome = h.processor.handle(&request(ACME, "bob@example.com")).await.unwrap();
    assert!(matches!(
        outcome,
        HandleOutcome::Processed {
            remaining: Some(99),
            ..
        }
    ));

    h.store.clear_failures();
    h.store.fail_writes(true);

    let outcome = h.processor.handle(&request(ACME, "bob@example.com")).await.unwrap();
    assert!(matches!(
        outcome,
        HandleOutcome::Processed {
            remaining: None,
            ..
        }
    ));
    assert_eq!(h.channel.send_count(), 2);
}

#[tokio::test]
async fn test_unreadable_quota_is_treated_as_exhausted() {
    let h = harness(RecordingChannel::new(), no_retry());
    let tenant = TenantId::from(ACME);
    h.quota.reset(&tenant, QuotaDate::today(), 40).await.unwrap();
    h.store.fail_reads(true);

    let outcome = h.processor.handle(&request(ACME, "bob@example.com")).await.unwrap();

    // The read failed, so the record was reset to 100 before the deduction
    assert!(matches!(
        outcome,
        HandleOutcome::Processed {
            remaining: Some(99),
            ..
        }
    ));
}
