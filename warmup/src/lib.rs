//! Multi-tenant email warmup sender.
//!
//! [`Warmup`] is the top-level configuration, a RON file found by
//! [`Warmup::load`]. [`Warmup::build`] wires the quota store, channels and
//! event source into [`Components`], and [`Warmup::run`] drives the
//! processor and scheduler until the process is told to stop.

pub mod controller;
pub mod error;

pub use controller::{CONFIG_ENV, CONFIG_SEARCH_PATH, Components, Warmup};
pub use error::ConfigError;
