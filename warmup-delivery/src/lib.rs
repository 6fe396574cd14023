//! Send pipeline for the warmup sender
//!
//! This crate provides functionality to:
//! - Pull send requests from an event source with a pool of workers
//! - Gate each send on the tenant's daily quota
//! - Send through the tenant's delivery channel, retrying with backoff
//! - Score the outcome and record it against the tenant's quota
//! - Scale quotas up daily for tenants with good scores

pub mod channel;
mod error;
pub mod processor;
pub mod resolver;
pub mod retry;
pub mod scheduler;
pub mod source;
pub mod validator;

pub use channel::{ChannelKind, ChannelSettings, DeliveryChannel, registry::ChannelRegistry};
pub use error::{ChannelError, ProcessError, ResolveError, SourceError};
pub use processor::{HandleOutcome, ProcessorConfig, WarmupProcessor};
pub use resolver::{AddressResolver, StaticAddressResolver};
pub use retry::RetryPolicy;
pub use scheduler::{RunReport, Scheduler, SchedulerConfig};
pub use source::{
    DirectoryEventSource, EventSource, InboundEvent, MemoryEventSource, SourceConfig,
};
pub use validator::{DisposableDomainValidator, Validator};
