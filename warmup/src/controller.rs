use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};

use ahash::AHashMap;
use serde::Deserialize;
use tokio::{sync::broadcast, task::JoinSet};
use warmup_common::{Signal, TenantId, internal, logging, tracing};
use warmup_delivery::{
    ChannelKind, ChannelRegistry, ChannelSettings, DisposableDomainValidator, EventSource,
    ProcessorConfig, Scheduler, SchedulerConfig, SourceConfig, StaticAddressResolver,
    WarmupProcessor,
};
use warmup_quota::{QuotaEngine, QuotaPolicy, StoreConfig};

use crate::error::ConfigError;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "WARMUP_CONFIG";

/// Where the configuration file is looked for, in order, when neither an
/// explicit path nor [`CONFIG_ENV`] is given.
pub const CONFIG_SEARCH_PATH: [&str; 2] = ["warmup.config.ron", "/etc/warmup/warmup.config.ron"];

/// Top-level configuration
///
/// # Examples
///
/// ```ron
/// Warmup (
///     store: Redis((url: "redis://127.0.0.1:6379")),
///     source: Directory(path: "/var/spool/warmup"),
///     channel_settings: (
///         smtp: Some((host: "smtp.example.com")),
///     ),
///     channels: { "acme": smtp },
///     senders: { "acme": "warmup@acme.example" },
/// )
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Warmup {
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub quota: QuotaPolicy,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub channel_settings: ChannelSettings,

    /// Which channel each tenant sends through. Only these tenants are
    /// evaluated by the scheduler.
    #[serde(default, alias = "provider_map")]
    pub channels: AHashMap<TenantId, ChannelKind>,

    /// Sender address per tenant
    #[serde(default, alias = "sender_map")]
    pub senders: AHashMap<TenantId, String>,

    /// Recipient domains that are never sent to
    #[serde(default)]
    pub disposable_domains: Vec<String>,
}

/// Everything [`Warmup::build`] wires together, ready to serve.
#[derive(Debug)]
pub struct Components {
    pub processor: Arc<WarmupProcessor>,
    pub scheduler: Arc<Scheduler>,
    pub source: Arc<dyn EventSource>,
}

async fn terminate() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!("Terminate Signal received, shutting down");
        }
    };

    Ok(())
}

impl Warmup {
    /// Load the configuration from `explicit` if given, otherwise from the
    /// file named by [`CONFIG_ENV`], otherwise from the first file that
    /// exists on [`CONFIG_SEARCH_PATH`].
    ///
    /// # Errors
    /// If no file is found, it cannot be read or it does not parse.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let search = CONFIG_SEARCH_PATH.map(PathBuf::from);

        let path = Self::locate(explicit.or(from_env), &search)?;
        Self::from_file(&path)
    }

    /// Resolve the configuration file. A `requested` path must exist; it is
    /// never silently replaced by one from `search`.
    ///
    /// # Errors
    /// [`ConfigError::MissingFile`] if `requested` does not exist, or
    /// [`ConfigError::NotFound`] if nothing on `search` does.
    pub fn locate(requested: Option<PathBuf>, search: &[PathBuf]) -> Result<PathBuf, ConfigError> {
        if let Some(path) = requested {
            return if path.is_file() {
                Ok(path)
            } else {
                Err(ConfigError::MissingFile(path))
            };
        }

        search
            .iter()
            .find(|path| path.is_file())
            .cloned()
            .ok_or_else(|| ConfigError::NotFound(search.to_vec()))
    }

    /// Read and parse a RON configuration file.
    ///
    /// # Errors
    /// If the file cannot be read or does not parse.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_ron(&content)
    }

    /// Parse a RON configuration document.
    ///
    /// # Errors
    /// If the document is malformed or names an unknown channel kind.
    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(content)?)
    }

    /// Check the settings that cannot be expressed in the types.
    ///
    /// Tenants with a channel but no sender address are accepted with a
    /// warning; their events are redelivered until a sender is configured.
    ///
    /// # Errors
    /// If there are no workers, the quota policy is unusable or the score
    /// threshold is not a number.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processor.worker_count == 0 {
            return Err(ConfigError::NoWorkers);
        }

        self.quota.validate()?;

        if !self.scheduler.score_threshold.is_finite() {
            return Err(ConfigError::InvalidThreshold(
                self.scheduler.score_threshold,
            ));
        }

        let mut missing = self
            .channels
            .keys()
            .filter(|tenant| !self.senders.contains_key(*tenant))
            .collect::<Vec<_>>();
        missing.sort();
        for tenant in missing {
            tracing::warn!(%tenant, "Tenant has a channel but no sender address");
        }

        Ok(())
    }

    /// Validate, then connect the store, build the channels and open the
    /// event source.
    ///
    /// # Errors
    /// If validation fails or any backend cannot be set up.
    pub async fn build(self) -> Result<Components, ConfigError> {
        self.validate()?;

        let store = self.store.into_store().await?;
        let quota = QuotaEngine::new(store, self.quota);

        let channels = ChannelRegistry::build(&self.channels, &self.channel_settings)?;
        let tenants = channels.tenants();
        internal!(
            level = INFO,
            "Configured {} tenants: {}",
            tenants.len(),
            tenants
                .iter()
                .map(TenantId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let processor = WarmupProcessor::new(
            self.processor,
            quota.clone(),
            Arc::new(DisposableDomainValidator::new(self.disposable_domains)),
            Arc::new(StaticAddressResolver::new(self.senders)),
            Arc::new(channels),
        );
        let scheduler = Scheduler::new(self.scheduler, quota, tenants);
        let source = self.source.into_source().await?;

        Ok(Components {
            processor: Arc::new(processor),
            scheduler: Arc::new(scheduler),
            source,
        })
    }

    /// Run the processor and scheduler until CTRL+C or SIGTERM.
    ///
    /// # Errors
    /// If the configuration is rejected or the signal handlers cannot be
    /// installed.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        internal!("Controller running");

        let components = self.build().await?;
        components.run_until(terminate()).await
    }
}

impl Components {
    /// Serve until `shutdown` resolves or the event source closes.
    ///
    /// Once either happens every task is told to stop. In-flight events are
    /// finished and settled with the source before this returns; a CTRL+C
    /// while waiting abandons them.
    ///
    /// # Errors
    /// If `shutdown` itself fails.
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        let (signals, _) = broadcast::channel(16);

        let mut tasks = JoinSet::new();
        tasks.spawn(
            Arc::clone(&self.processor).serve(Arc::clone(&self.source), signals.subscribe()),
        );

        let scheduler = Arc::clone(&self.scheduler);
        let receiver = signals.subscribe();
        tasks.spawn(async move { scheduler.serve(receiver).await });

        let ret = tokio::select! {
            r = shutdown => r,
            _ = tasks.join_next() => {
                internal!(level = INFO, "Event source closed");
                Ok(())
            }
        };

        internal!("Shutting down...");
        let _ = signals.send(Signal::Shutdown);
        self.source.close();

        let drained = tokio::select! {
            () = async {
                while let Some(joined) = tasks.join_next().await {
                    if let Err(e) = joined {
                        tracing::error!("Task failed during shutdown: {e}");
                    }
                }
            } => true,
            _ = tokio::signal::ctrl_c() => false,
        };

        if !drained {
            tracing::warn!("Forced shutdown, abandoning in-flight events");
            tasks.abort_all();
        }

        let _ = signals.send(Signal::Finalised);
        internal!(level = INFO, "Shutdown complete");

        ret
    }
}
