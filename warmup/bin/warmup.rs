#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use std::path::PathBuf;

/// `warmup [CONFIG]`
///
/// Without an argument the configuration comes from `WARMUP_CONFIG` or the
/// default search path.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);

    warmup::Warmup::load(explicit)?.run().await
}
