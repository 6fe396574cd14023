//! Typed errors for the send pipeline.
//!
//! Only [`ProcessError`] escapes [`crate::WarmupProcessor::handle`], and every
//! variant of it means the event should be redelivered. Send failures, status
//! check failures and quota store failures are absorbed inside the pipeline.

use thiserror::Error;
use warmup_common::{RequestError, TenantId};

use crate::channel::ChannelKind;

/// Failure of a delivery channel operation, or of picking one.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel could not hand the message over.
    #[error("Send failed: {0}")]
    Send(String),

    /// A bounce/open/spam probe failed.
    #[error("Status check failed: {0}")]
    Check(String),

    /// The tenant is mapped to a channel kind with no implementation.
    #[error("Channel kind {0} is not supported")]
    Unsupported(ChannelKind),

    /// The tenant has no channel mapping at all.
    #[error("No delivery channel configured for tenant {0}")]
    NoChannel(TenantId),

    /// Invalid or missing channel settings.
    #[error("Channel configuration error: {0}")]
    Configuration(String),
}

/// Failure to find the sender address for a tenant.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No sender address for tenant {0}")]
    UnknownTenant(TenantId),

    #[error("Address lookup failed: {0}")]
    Backend(String),
}

/// Failure of the inbound event source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not encode event: {0}")]
    Encode(#[from] RequestError),

    /// The source no longer accepts events.
    #[error("Event source is closed")]
    Closed,

    /// `ack`/`nack` for an event this source did not hand out.
    #[error("Unknown event {0}")]
    UnknownEvent(String),
}

/// Failure of a single event that requires it to be redelivered.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Could not resolve sender address: {0}")]
    Resolution(#[from] ResolveError),

    #[error("Could not select delivery channel: {0}")]
    ChannelSelection(#[from] ChannelError),

    #[error("Event source error: {0}")]
    Source(#[from] SourceError),
}

impl ProcessError {
    #[must_use]
    pub const fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }

    #[must_use]
    pub const fn is_channel_selection(&self) -> bool {
        matches!(self, Self::ChannelSelection(_))
    }

    #[must_use]
    pub const fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }
}
