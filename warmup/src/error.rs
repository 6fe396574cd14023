use std::path::PathBuf;

use thiserror::Error;
use warmup_delivery::{ChannelError, SourceError};
use warmup_quota::QuotaError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file {} does not exist", .0.display())]
    MissingFile(PathBuf),

    #[error("No configuration file found, looked in: {}", list(.0))]
    NotFound(Vec<PathBuf>),

    #[error("Failed to read configuration from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("worker_count must be at least 1")]
    NoWorkers,

    #[error("score_threshold must be a finite number, got {0}")]
    InvalidThreshold(f64),

    #[error("Quota configuration rejected: {0}")]
    Quota(#[from] QuotaError),

    #[error("Channel configuration rejected: {0}")]
    Channel(#[from] ChannelError),

    #[error("Unable to open event source: {0}")]
    Source(#[from] SourceError),
}

fn list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
