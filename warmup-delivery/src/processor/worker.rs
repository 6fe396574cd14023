use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use tracing::{debug, error, warn};
use warmup_common::SendRequest;

use super::WarmupProcessor;
use crate::{
    error::ProcessError,
    source::{EventSource, InboundEvent},
};

/// Pause after the source itself fails, before pulling again.
const RECEIVE_BACKOFF: Duration = Duration::from_secs(1);

pub(super) async fn run(
    id: usize,
    processor: Arc<WarmupProcessor>,
    source: Arc<dyn EventSource>,
    mut stop: watch::Receiver<bool>,
) {
    debug!(worker = id, "worker started");

    loop {
        if *stop.borrow() {
            break;
        }

        let received = tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            received = source.receive() => received,
        };

        match received {
            Ok(Some(event)) => {
                match dispatch(&processor, source.as_ref(), &event).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tokio::time::sleep(processor.config.redelivery_backoff()).await;
                    }
                    Err(e) => error!(worker = id, tag = %event.tag, "Failed to settle event: {e}"),
                }
            }
            Ok(None) => {
                debug!(worker = id, "event source drained");
                break;
            }
            Err(e) => {
                error!(worker = id, "Failed to receive event: {e}");
                tokio::time::sleep(RECEIVE_BACKOFF).await;
            }
        }
    }

    debug!(worker = id, "worker stopped");
}

/// Handle one event and settle it with the source. Returns `false` if the
/// event was returned for redelivery.
async fn dispatch(
    processor: &WarmupProcessor,
    source: &dyn EventSource,
    event: &InboundEvent,
) -> Result<bool, ProcessError> {
    let request = match SendRequest::from_json(&event.payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(tag = %event.tag, error = %e, "dropping malformed event");
            source.ack(event).await?;
            return Ok(true);
        }
    };

    match processor.handle(&request).await {
        Ok(_) => {
            source.ack(event).await?;
            Ok(true)
        }
        Err(e) => {
            warn!(
                tag = %event.tag,
                tenant_id = %request.tenant_id,
                redelivered = event.redelivered,
                error = %e,
                "event failed, returning it for redelivery"
            );
            source.nack(event).await?;
            Ok(false)
        }
    }
}
