//! File-drop event source.
//!
//! Producers drop one `*.json` file per request into a directory. A worker
//! claims a file by renaming it to `*.json.processing`; the rename is atomic,
//! so exactly one worker wins each file. Acking deletes the claimed file,
//! nacking renames it back (marked as redelivered).
//!
//! Files left claimed by a crash, or by a receive cancelled between the claim
//! and the read, are returned to the queue the next time the source is
//! opened.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};
use warmup_common::{SendRequest, internal};

use super::{EventSource, InboundEvent};
use crate::error::SourceError;

const PENDING_SUFFIX: &str = ".json";
const CLAIMED_SUFFIX: &str = ".processing";
const REDELIVERED_MARKER: &str = ".redelivered";
const TEMP_PREFIX: &str = ".tmp_";

pub(crate) const fn default_poll_interval_millis() -> u64 {
    1000
}

#[derive(Debug)]
pub struct DirectoryEventSource {
    path: PathBuf,
    poll_interval: Duration,
    closed: AtomicBool,
}

impl DirectoryEventSource {
    /// Open (creating if needed) a drop directory and restore any files left
    /// claimed by a previous run.
    ///
    /// # Errors
    /// If the directory cannot be created, scanned, or an orphaned file
    /// cannot be restored.
    pub async fn open(
        path: impl Into<PathBuf>,
        poll_interval: Duration,
    ) -> Result<Self, SourceError> {
        let path = path.into();
        fs::create_dir_all(&path).await?;

        let source = Self {
            path,
            poll_interval,
            closed: AtomicBool::new(false),
        };

        let restored = source.restore_orphans().await?;
        internal!(
            level = INFO,
            "Opened drop directory {} ({restored} orphaned events restored)",
            source.path.display()
        );

        Ok(source)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn restore_orphans(&self) -> Result<usize, SourceError> {
        let mut restored = 0;

        for name in self.list().await? {
            if name.starts_with(TEMP_PREFIX) {
                debug!(file = %name, "removing incomplete write");
                fs::remove_file(self.path.join(&name)).await?;
            } else if let Some(pending) = name.strip_suffix(CLAIMED_SUFFIX) {
                fs::rename(self.path.join(&name), self.path.join(pending)).await?;
                restored += 1;
            }
        }

        Ok(restored)
    }

    async fn list(&self) -> Result<Vec<String>, SourceError> {
        let mut entries = fs::read_dir(&self.path).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        names.sort_unstable();
        Ok(names)
    }

    /// Claim the oldest pending file, if any.
    async fn claim_next(&self) -> Result<Option<InboundEvent>, SourceError> {
        let pending = self
            .list()
            .await?
            .into_iter()
            .filter(|name| name.ends_with(PENDING_SUFFIX) && !name.starts_with(TEMP_PREFIX));

        for name in pending {
            let claimed = format!("{name}{CLAIMED_SUFFIX}");
            let claimed_path = self.path.join(&claimed);

            match fs::rename(self.path.join(&name), &claimed_path).await {
                Ok(()) => {}
                // Another worker got there first
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }

            let payload = fs::read(&claimed_path).await?;
            let redelivered = name
                .strip_suffix(PENDING_SUFFIX)
                .is_some_and(|stem| stem.ends_with(REDELIVERED_MARKER));

            return Ok(Some(InboundEvent {
                tag: claimed,
                payload,
                redelivered,
            }));
        }

        Ok(None)
    }

    fn claimed_path(&self, event: &InboundEvent) -> Result<PathBuf, SourceError> {
        if event.tag.contains(['/', '\\']) || !event.tag.ends_with(CLAIMED_SUFFIX) {
            return Err(SourceError::UnknownEvent(event.tag.clone()));
        }

        Ok(self.path.join(&event.tag))
    }
}

#[async_trait]
impl EventSource for DirectoryEventSource {
    async fn receive(&self) -> Result<Option<InboundEvent>, SourceError> {
        loop {
            if let Some(event) = self.claim_next().await? {
                return Ok(Some(event));
            }

            if self.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn ack(&self, event: &InboundEvent) -> Result<(), SourceError> {
        match fs::remove_file(self.claimed_path(event)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(SourceError::UnknownEvent(event.tag.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn nack(&self, event: &InboundEvent) -> Result<(), SourceError> {
        let claimed = self.claimed_path(event)?;
        let pending = event
            .tag
            .strip_suffix(CLAIMED_SUFFIX)
            .unwrap_or(&event.tag);
        let stem = pending.strip_suffix(PENDING_SUFFIX).unwrap_or(pending);

        let requeued = if stem.ends_with(REDELIVERED_MARKER) {
            pending.to_string()
        } else {
            format!("{stem}{REDELIVERED_MARKER}{PENDING_SUFFIX}")
        };

        match fs::rename(&claimed, self.path.join(&requeued)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(tag = %event.tag, "nack for an event that is no longer claimed");
                Err(SourceError::UnknownEvent(event.tag.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn publish(&self, request: &SendRequest) -> Result<(), SourceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SourceError::Closed);
        }

        let name = format!("{}{PENDING_SUFFIX}", ulid::Ulid::new());
        let temp = self.path.join(format!("{TEMP_PREFIX}{name}"));

        fs::write(&temp, request.to_json()?).await?;
        fs::rename(&temp, self.path.join(&name)).await?;

        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
