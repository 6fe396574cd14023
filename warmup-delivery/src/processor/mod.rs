//! Event processor orchestration
//!
//! A fixed pool of workers pulls events from a shared [`EventSource`]; each
//! worker runs one event through [`WarmupProcessor::handle`] at a time.

pub mod process;
mod send;
mod worker;

use std::{sync::Arc, time::Duration};

use serde::Deserialize;
use tokio::{
    sync::{broadcast, watch},
    task::JoinSet,
};
use warmup_common::{DeliveryOutcome, Score, Signal, internal};
use warmup_quota::QuotaEngine;

use crate::{
    channel::registry::ChannelRegistry, resolver::AddressResolver, retry::RetryPolicy,
    source::EventSource, validator::Validator,
};

const fn default_worker_count() -> usize {
    5
}

const fn default_redelivery_backoff() -> u64 {
    1000 // 1 second
}

/// Processor settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    /// Number of events handled in parallel
    ///
    /// Default: 5
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// How long a worker waits after returning a failed event to the source
    /// before pulling the next one (in milliseconds).
    ///
    /// Keeps a persistently failing event from spinning a worker.
    ///
    /// Default: 1000 milliseconds
    #[serde(default = "default_redelivery_backoff")]
    pub redelivery_backoff_millis: u64,

    /// Retry policy for sending a single message
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            redelivery_backoff_millis: default_redelivery_backoff(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ProcessorConfig {
    #[must_use]
    pub const fn redelivery_backoff(&self) -> Duration {
        Duration::from_millis(self.redelivery_backoff_millis)
    }
}

/// What [`WarmupProcessor::handle`] did with a request it did not fail on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The recipient was rejected; nothing was sent or recorded.
    Dropped,
    /// The pipeline ran to the end. `remaining` is the quota left after the
    /// deduction, or `None` if the deduction failed.
    Processed {
        outcome: DeliveryOutcome,
        score: Score,
        remaining: Option<i64>,
    },
}

#[derive(Debug)]
pub struct WarmupProcessor {
    config: ProcessorConfig,
    quota: QuotaEngine,
    validator: Arc<dyn Validator>,
    resolver: Arc<dyn AddressResolver>,
    channels: Arc<ChannelRegistry>,
}

impl WarmupProcessor {
    pub fn new(
        config: ProcessorConfig,
        quota: QuotaEngine,
        validator: Arc<dyn Validator>,
        resolver: Arc<dyn AddressResolver>,
        channels: Arc<ChannelRegistry>,
    ) -> Self {
        Self {
            config,
            quota,
            validator,
            resolver,
            channels,
        }
    }

    pub const fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub const fn quota(&self) -> &QuotaEngine {
        &self.quota
    }

    /// Run the worker pool until shutdown is signalled or the source closes.
    ///
    /// ## Graceful Shutdown
    ///
    /// When a shutdown signal is received, workers stop pulling new events.
    /// Events already being handled, including any backoff sleeps between
    /// send attempts, run to completion and are settled with the source
    /// before this returns.
    pub async fn serve(
        self: Arc<Self>,
        source: Arc<dyn EventSource>,
        mut shutdown: broadcast::Receiver<Signal>,
    ) {
        let worker_count = self.config.worker_count.max(1);
        internal!(level = INFO, "Warmup processor starting {worker_count} workers");

        let (stop, stopped) = watch::channel(false);
        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            workers.spawn(worker::run(
                id,
                Arc::clone(&self),
                Arc::clone(&source),
                stopped.clone(),
            ));
        }
        drop(stopped);

        loop {
            tokio::select! {
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!("Warmup processor received shutdown signal");
                        }
                        Err(e) => {
                            tracing::error!("Warmup processor shutdown channel error: {e}");
                        }
                    }
                    break;
                }
                joined = workers.join_next() => {
                    match joined {
                        Some(Ok(())) => {}
                        Some(Err(e)) => tracing::error!("Worker task failed: {e}"),
                        None => {
                            internal!(level = INFO, "Event source closed, all workers finished");
                            return;
                        }
                    }
                }
            }
        }

        // Receivers are only dropped once every worker has exited
        let _ = stop.send(true);

        let in_flight = workers.len();
        if in_flight > 0 {
            internal!("Waiting for {in_flight} workers to finish in-flight events");
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task failed: {e}");
            }
        }

        internal!(level = INFO, "Warmup processor shutdown complete");
    }
}
