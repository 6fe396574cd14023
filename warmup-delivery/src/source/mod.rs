//! Inbound event sources.
//!
//! A source hands out one event per [`EventSource::receive`] call. Every
//! event handed out must later be settled with exactly one of
//! [`EventSource::ack`] (done, drop it) or [`EventSource::nack`] (put it back
//! for redelivery).

pub mod directory;
pub mod memory;

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use warmup_common::SendRequest;

pub use self::{directory::DirectoryEventSource, memory::MemoryEventSource};
use crate::error::SourceError;

/// One undecoded event as it came off the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Source-specific handle used to settle the event.
    pub tag: String,
    pub payload: Vec<u8>,
    /// `true` if this event was handed out before and nacked.
    pub redelivered: bool,
}

#[async_trait]
pub trait EventSource: Send + Sync + std::fmt::Debug {
    /// Wait for the next event. `None` once the source is closed and drained.
    ///
    /// Cancelling the returned future must not lose an event that has not
    /// been returned yet.
    ///
    /// # Errors
    /// If the underlying transport fails.
    async fn receive(&self) -> Result<Option<InboundEvent>, SourceError>;

    /// Mark an event as handled.
    ///
    /// # Errors
    /// If the event is unknown to this source or the transport fails.
    async fn ack(&self, event: &InboundEvent) -> Result<(), SourceError>;

    /// Return an event to the source for redelivery.
    ///
    /// # Errors
    /// If the event is unknown to this source or the transport fails.
    async fn nack(&self, event: &InboundEvent) -> Result<(), SourceError>;

    /// Enqueue a new request.
    ///
    /// # Errors
    /// If the source is closed or the transport fails.
    async fn publish(&self, request: &SendRequest) -> Result<(), SourceError>;

    /// Stop handing out events once the backlog is drained.
    fn close(&self);
}

/// Selection of the inbound event source
///
/// # Examples
///
/// A drop directory polled for `*.json` files:
/// ```ron
/// Warmup (
///     source: Directory(
///         path: "/var/spool/warmup",
///         poll_interval_millis: 500,
///     ),
/// )
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub enum SourceConfig {
    /// In-process queue; events are only accepted through `publish`.
    #[default]
    Memory,
    Directory {
        path: PathBuf,

        /// How long to wait between scans of an empty directory.
        ///
        /// Default: 1000 milliseconds
        #[serde(default = "directory::default_poll_interval_millis")]
        poll_interval_millis: u64,
    },
}

impl SourceConfig {
    /// Open the configured source.
    ///
    /// # Errors
    /// If the directory cannot be created or scanned.
    pub async fn into_source(self) -> Result<Arc<dyn EventSource>, SourceError> {
        match self {
            Self::Memory => Ok(Arc::new(MemoryEventSource::new())),
            Self::Directory {
                path,
                poll_interval_millis,
            } => Ok(Arc::new(
                DirectoryEventSource::open(
                    path,
                    std::time::Duration::from_millis(poll_interval_millis),
                )
                .await?,
            )),
        }
    }
}
