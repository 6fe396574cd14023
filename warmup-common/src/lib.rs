//! Shared building blocks for the warmup sender.
//!
//! Everything here is used by more than one crate in the workspace: the
//! inbound [`SendRequest`], the [`TenantId`] and [`QuotaDate`] newtypes that
//! key the quota store, the [`DeliveryOutcome`] to [`Score`] mapping, and the
//! logging setup.

pub mod date;
pub mod logging;
pub mod outcome;
pub mod request;
pub mod tenant;

pub use date::QuotaDate;
pub use outcome::{DeliveryOutcome, Score};
pub use request::{RequestError, SendRequest};
pub use tenant::TenantId;
pub use tracing;

/// Lifecycle signal broadcast to every long-running task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Stop taking new work and wind down.
    Shutdown,
    /// Every task has finished winding down.
    Finalised,
}
