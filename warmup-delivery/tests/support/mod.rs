//! Test doubles for the send pipeline
#![allow(dead_code)] // Test utility module - not all helpers used in every test

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{sync::Notify, time::Instant};
use warmup_delivery::{
    ChannelError, ChannelKind, ChannelRegistry, DeliveryChannel, DisposableDomainValidator,
    ProcessorConfig, RetryPolicy, StaticAddressResolver, WarmupProcessor,
};
use warmup_quota::{QuotaEngine, QuotaPolicy, TestKeyValueStore};

/// Tenant with a working channel and a sender address.
pub const ACME: &str = "acme";
/// Tenant mapped to an unimplemented channel kind.
pub const GLOBEX: &str = "globex";
/// Tenant with a channel but no sender address.
pub const INITECH: &str = "initech";

pub const SENDER: &str = "warm@acme.io";
pub const DISPOSABLE: &str = "mailinator.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRecord {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub at: Instant,
}

/// Channel that records every send and answers probes from fixed flags.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    failures_left: AtomicUsize,
    bounced: bool,
    opened: bool,
    spam: bool,
    failing_checks: bool,
    sends: Mutex<Vec<SendRecord>>,
    notify: Notify,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` sends.
    pub fn failing_first(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn always_failing(self) -> Self {
        self.failing_first(usize::MAX)
    }

    pub const fn with_signals(mut self, bounced: bool, opened: bool, spam: bool) -> Self {
        self.bounced = bounced;
        self.opened = opened;
        self.spam = spam;
        self
    }

    pub const fn failing_checks(mut self) -> Self {
        self.failing_checks = true;
        self
    }

    pub fn sends(&self) -> Vec<SendRecord> {
        self.sends.lock().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().len()
    }

    /// Wait until at least `expected` send attempts have been made.
    pub async fn wait_for_sends(&self, expected: usize, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                if self.send_count() >= expected {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for sends");
    }

    fn check(&self, flag: bool) -> Result<bool, ChannelError> {
        if self.failing_checks {
            Err(ChannelError::Check("probe unavailable".to_string()))
        } else {
            Ok(flag)
        }
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Smtp
    }

    async fn send(&self, from: &str, to: &str, subject: &str, _body: &str) -> Result<(), ChannelError> {
        self.sends.lock().push(SendRecord {
            from: from.to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            at: Instant::now(),
        });
        self.notify.notify_waiters();

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                (left > 0).then(|| left.saturating_sub(usize::from(left != usize::MAX)))
            })
            .is_ok();

        if failed {
            Err(ChannelError::Send("relay refused".to_string()))
        } else {
            Ok(())
        }
    }

    async fn check_bounce(&self, _: &str, _: &str, _: &str) -> Result<bool, ChannelError> {
        self.check(self.bounced)
    }

    async fn check_open(&self, _: &str, _: &str, _: &str) -> Result<bool, ChannelError> {
        self.check(self.opened)
    }

    async fn check_spam(&self, _: &str, _: &str, _: &str) -> Result<bool, ChannelError> {
        self.check(self.spam)
    }
}

pub struct Harness {
    pub store: Arc<TestKeyValueStore>,
    pub quota: QuotaEngine,
    pub channel: Arc<RecordingChannel>,
    pub processor: Arc<WarmupProcessor>,
}

pub fn retry(max_retries: u32, initial_delay: Duration) -> RetryPolicy {
    RetryPolicy::new(max_retries, initial_delay)
}

pub fn harness(channel: RecordingChannel, retry: RetryPolicy) -> Harness {
    harness_with(channel, ProcessorConfig {
        worker_count: 3,
        redelivery_backoff_millis: 10,
        retry,
    })
}

pub fn harness_with(channel: RecordingChannel, config: ProcessorConfig) -> Harness {
    let store = Arc::new(TestKeyValueStore::new());
    let quota = QuotaEngine::new(store.clone(), QuotaPolicy::default());
    let channel = Arc::new(channel);

    let mut channels = ChannelRegistry::new();
    channels.insert(ACME.into(), channel.clone());
    channels.insert(INITECH.into(), channel.clone());
    channels.insert_unsupported(GLOBEX.into(), ChannelKind::Outlook);

    let resolver: StaticAddressResolver = [
        (ACME.into(), SENDER.to_string()),
        (GLOBEX.into(), "warm@globex.io".to_string()),
    ]
    .into_iter()
    .collect();

    let processor = Arc::new(WarmupProcessor::new(
        config,
        quota.clone(),
        Arc::new(DisposableDomainValidator::new([DISPOSABLE])),
        Arc::new(resolver),
        Arc::new(channels),
    ));

    Harness {
        store,
        quota,
        channel,
        processor,
    }
}
