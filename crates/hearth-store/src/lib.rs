//! Shared state store — the handoff channel between broker and interface
//!
//! One process writes a snapshot per tick, the other reads it. Two
//! backends: a shared in-memory key-value service (preferred when
//! reachable) and an atomic-rename file. The backend is probed once at
//! startup; every operation afterward is bounded by a hard timeout so a
//! stuck disk or socket cannot stall a tick.

pub mod file;
pub mod history;
pub mod kv;

use std::path::Path;
use std::time::Duration;

use hearth_core::config::StoreConfig;
use hearth_core::{Error, Result, Snapshot};
use tracing::{info, warn};

use file::FileBackend;
use kv::KvBackend;

/// A snapshot backend. Implementations must make `write` atomic: a
/// concurrent `read` sees either the previous snapshot or the new one,
/// never a torn payload.
#[async_trait::async_trait]
pub trait SnapshotBackend: Send + Sync {
    async fn write(&self, snapshot: &Snapshot) -> Result<()>;
    /// `Ok(None)` covers both "nothing written yet" and "payload did not
    /// parse" — a torn or foreign payload is treated as absence, never an
    /// error surfaced to the tick loop.
    async fn read(&self) -> Result<Option<Snapshot>>;
    async fn clear(&self) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Facade over the probed backend. All operations share one configured
/// timeout; a timeout is reported as its own error variant and treated by
/// callers like any hard failure.
pub struct SnapshotStore {
    backend: Box<dyn SnapshotBackend>,
    io_timeout: Duration,
}

impl SnapshotStore {
    /// Probe for the KV service; fall back to the atomic file. Called once
    /// per process at startup.
    pub async fn connect(data_dir: &Path, cfg: &StoreConfig) -> Self {
        let probe = Duration::from_millis(cfg.kv_probe_timeout_ms);
        let io_timeout = Duration::from_millis(cfg.io_timeout_ms);

        let backend: Box<dyn SnapshotBackend> = match KvBackend::probe(&cfg.kv_addr, probe).await {
            Ok(kv) => {
                info!(addr = %cfg.kv_addr, "snapshot store: kv backend");
                Box::new(kv)
            }
            Err(e) => {
                let path = data_dir.join(&cfg.snapshot_file);
                info!(path = %path.display(), "snapshot store: file backend ({e})");
                Box::new(FileBackend::new(path))
            }
        };

        Self {
            backend,
            io_timeout,
        }
    }

    /// Build directly on a specific backend. Tests and single-backend
    /// deployments skip the probe.
    pub fn with_backend(backend: Box<dyn SnapshotBackend>, io_timeout: Duration) -> Self {
        Self {
            backend,
            io_timeout,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn write(&self, snapshot: &Snapshot) -> Result<()> {
        self.bounded(self.backend.write(snapshot)).await?
    }

    pub async fn read(&self) -> Result<Option<Snapshot>> {
        self.bounded(self.backend.read()).await?
    }

    pub async fn clear(&self) -> Result<()> {
        let result = self.bounded(self.backend.clear()).await.and_then(|r| r);
        if let Err(e) = &result {
            warn!("snapshot clear failed: {e}");
        }
        result
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<Result<T>> {
        match tokio::time::timeout(self.io_timeout, fut).await {
            Ok(inner) => Ok(inner),
            Err(_) => Err(Error::StoreTimeout(self.io_timeout.as_millis() as u64)),
        }
    }
}
