use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use warmup_common::SendRequest;

use super::{EventSource, InboundEvent};
use crate::error::SourceError;

#[derive(Debug, Default)]
struct Shared {
    queue: Mutex<VecDeque<InboundEvent>>,
    notify: Notify,
    closed: AtomicBool,
    acked: AtomicUsize,
    nacked: AtomicUsize,
}

/// In-process event queue
///
/// Nacked events go to the back of the queue with `redelivered` set. Useful
/// for tests and for embedding the processor in another service.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSource {
    shared: Arc<Shared>,
}

impl MemoryEventSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a raw payload, bypassing encoding.
    ///
    /// # Errors
    /// If the source is closed.
    pub fn push_raw(&self, payload: impl Into<Vec<u8>>) -> Result<(), SourceError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(SourceError::Closed);
        }

        self.enqueue(InboundEvent {
            tag: ulid::Ulid::new().to_string(),
            payload: payload.into(),
            redelivered: false,
        });
        Ok(())
    }

    /// Events waiting to be received.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    #[must_use]
    pub fn acked(&self) -> usize {
        self.shared.acked.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn nacked(&self) -> usize {
        self.shared.nacked.load(Ordering::SeqCst)
    }

    fn enqueue(&self, event: InboundEvent) {
        self.shared.queue.lock().push_back(event);
        self.shared.notify.notify_waiters();
    }
}

#[async_trait]
impl EventSource for MemoryEventSource {
    async fn receive(&self) -> Result<Option<InboundEvent>, SourceError> {
        loop {
            let notified = self.shared.notify.notified();

            let next = self.shared.queue.lock().pop_front();
            if let Some(event) = next {
                return Ok(Some(event));
            }

            if self.shared.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }

            notified.await;
        }
    }

    async fn ack(&self, _event: &InboundEvent) -> Result<(), SourceError> {
        self.shared.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn nack(&self, event: &InboundEvent) -> Result<(), SourceError> {
        self.shared.nacked.fetch_add(1, Ordering::SeqCst);
        self.enqueue(InboundEvent {
            redelivered: true,
            ..event.clone()
        });
        Ok(())
    }

    async fn publish(&self, request: &SendRequest) -> Result<(), SourceError> {
        self.push_raw(request.to_json()?)
    }

    fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.notify.notify_waiters();
    }
}
