//! The broker — owner of the sensor bus and writer of the shared state
//!
//! One tick every couple of seconds: read the bus, derive the felt state,
//! record history, reassess the trajectory identity, ask governance, and
//! publish the whole thing as one atomic snapshot. Every stage degrades
//! rather than aborts: a failed bus read carries the previous state, a
//! failed flush logs, a failed snapshot write marks the broker degraded
//! until the store recovers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hearth_core::config::HearthConfig;
use hearth_core::{Identity, InternalState, Result, SensorAdapter, Snapshot};
use hearth_governance::{GovernanceBridge, MetricVector};
use hearth_store::history::HistoryRing;
use hearth_store::SnapshotStore;
use hearth_trajectory::continuity::load_or_seal_genesis;
use hearth_trajectory::{ContinuityMonitor, ContinuityReport, TrajectorySignature};

use crate::identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerPhase {
    Starting,
    Running,
    /// The snapshot store is rejecting writes; ticks continue and the
    /// phase clears on the first successful write.
    Degraded,
    ShuttingDown,
}

impl BrokerPhase {
    fn as_str(&self) -> &'static str {
        match self {
            BrokerPhase::Starting => "starting",
            BrokerPhase::Running => "running",
            BrokerPhase::Degraded => "degraded",
            BrokerPhase::ShuttingDown => "shutting_down",
        }
    }
}

pub struct Broker {
    cfg: HearthConfig,
    sensor: Arc<dyn SensorAdapter>,
    store: SnapshotStore,
    history: HistoryRing,
    identity: Identity,
    state: InternalState,
    monitor: ContinuityMonitor,
    bridge: GovernanceBridge,
    phase: BrokerPhase,
    /// Set when the identity store was unreadable and a fallback identity
    /// is in use. Sensing and publishing proceed, but the phase stays
    /// Degraded for the lifetime of the process.
    identity_degraded: bool,
    genesis_path: PathBuf,
    pid_path: PathBuf,
    last_continuity: Option<ContinuityReport>,
    consecutive_sensor_failures: u32,
}

impl Broker {
    /// Probe the store backends and assemble the broker. The identity
    /// wakes (or mints) here so the awakening count reflects process
    /// starts, not ticks.
    pub async fn new(
        data_dir: &Path,
        cfg: HearthConfig,
        sensor: Arc<dyn SensorAdapter>,
        name: &str,
    ) -> Result<Self> {
        let store = SnapshotStore::connect(data_dir, &cfg.store).await;
        Self::assemble(data_dir, cfg, sensor, name, store)
    }

    /// Assemble on a pre-built store. Tests inject file or scripted
    /// backends here and drive ticks directly.
    pub fn with_store(
        data_dir: &Path,
        cfg: HearthConfig,
        sensor: Arc<dyn SensorAdapter>,
        name: &str,
        store: SnapshotStore,
    ) -> Result<Self> {
        Self::assemble(data_dir, cfg, sensor, name, store)
    }

    fn assemble(
        data_dir: &Path,
        cfg: HearthConfig,
        sensor: Arc<dyn SensorAdapter>,
        name: &str,
        store: SnapshotStore,
    ) -> Result<Self> {
        let identity = identity::wake(data_dir, name);
        let identity_degraded = identity.is_fallback();
        if identity_degraded {
            warn!("running with fallback identity");
        }
        let history = HistoryRing::load(data_dir, &cfg.history);
        let monitor = ContinuityMonitor::new(cfg.trajectory.clone());
        let bridge = GovernanceBridge::new(cfg.governance.clone())?;

        let pid_path = data_dir.join("broker.pid");
        std::fs::create_dir_all(data_dir)?;
        std::fs::write(&pid_path, std::process::id().to_string())?;

        Ok(Self {
            genesis_path: data_dir.join("genesis.json"),
            pid_path,
            cfg,
            sensor,
            store,
            history,
            identity,
            state: InternalState::resting(),
            monitor,
            bridge,
            phase: BrokerPhase::Starting,
            identity_degraded,
            last_continuity: None,
            consecutive_sensor_failures: 0,
        })
    }

    pub fn state(&self) -> InternalState {
        self.state
    }

    pub fn phase(&self) -> BrokerPhase {
        self.phase
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn last_continuity(&self) -> Option<ContinuityReport> {
        self.last_continuity
    }

    /// Tick until cancelled, then shut down cleanly.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            backend = self.store.backend_name(),
            id = %self.identity.id,
            awakenings = self.identity.awakenings,
            "broker starting"
        );
        self.phase = if self.identity_degraded {
            BrokerPhase::Degraded
        } else {
            BrokerPhase::Running
        };

        let mut interval =
            tokio::time::interval(Duration::from_secs_f64(self.cfg.broker.tick_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => self.tick(Utc::now()).await,
            }
        }
        self.shutdown().await;
    }

    /// One full cycle: sense, derive, record, reassess identity, consult
    /// governance, publish.
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        let reading = self.sensor.read().filter(|r| !r.is_empty());
        let reading_stale = reading.is_none();
        match &reading {
            Some(r) => {
                self.state = InternalState::derive(r, &self.state, &self.cfg.state);
                if self.consecutive_sensor_failures > 0 {
                    info!(
                        after = self.consecutive_sensor_failures,
                        "sensor bus recovered"
                    );
                }
                self.consecutive_sensor_failures = 0;
            }
            None => {
                self.consecutive_sensor_failures += 1;
                if self.consecutive_sensor_failures == 1 {
                    warn!(sensor = self.sensor.name(), "sensor read failed, holding state");
                }
            }
        }

        self.history.push(now, self.state);
        if self.history.flush_due(now) {
            if let Err(e) = self.history.flush(now) {
                warn!("history flush failed: {e}");
            }
        }

        self.last_continuity = self.assess_trajectory(now);

        let aux = self.last_continuity.map(|r| {
            let lineage = r.lineage.unwrap_or(1.0);
            [
                r.confidence,
                1.0 - r.coherence.unwrap_or(1.0),
                lineage,
                1.0 - lineage,
            ]
        });
        let metrics = MetricVector::from_state(&self.state, aux, self.cfg.governance.aux_weight);
        let decision = self
            .bridge
            .decide(now, &metrics, self.phase.as_str())
            .await;

        let snapshot = Snapshot {
            written_at: now,
            reading,
            reading_stale,
            internal_state: self.state,
            identity: self.identity.clone(),
            governance: Some(decision),
        };
        match self.store.write(&snapshot).await {
            Ok(()) => {
                if self.phase == BrokerPhase::Degraded && !self.identity_degraded {
                    info!("snapshot store recovered");
                }
                self.phase = if self.identity_degraded {
                    BrokerPhase::Degraded
                } else {
                    BrokerPhase::Running
                };
            }
            Err(e) => {
                warn!("snapshot write failed: {e}");
                self.phase = BrokerPhase::Degraded;
            }
        }
    }

    /// Recompute the trajectory signature and run it past the continuity
    /// monitor. Genesis seals itself the first time a mature signature
    /// exists and no anchor does.
    fn assess_trajectory(&mut self, now: DateTime<Utc>) -> Option<ContinuityReport> {
        if self.history.len() < self.cfg.trajectory.basin_min_samples {
            return None;
        }
        let samples = self.history.samples();
        let sig = TrajectorySignature::compute(&samples, None, None, None, &self.cfg.trajectory);

        if !self.monitor.has_genesis()
            && sig.confidence(self.cfg.trajectory.confidence_floor) >= 1.0
        {
            match load_or_seal_genesis(&self.genesis_path, &sig) {
                Ok(record) => self.monitor.set_genesis(record.signature),
                // A damaged anchor is never replaced; lineage stays
                // unavailable until someone repairs the file.
                Err(e) => warn!("genesis anchor unavailable: {e}"),
            }
        }

        let report = self.monitor.assess(now, &sig);
        debug!(
            verdict = ?report.verdict,
            coherence = ?report.coherence,
            lineage = ?report.lineage,
            "continuity assessed"
        );
        Some(report)
    }

    /// Flush history, clear the snapshot so no interface trusts a dead
    /// broker's last word, and drop the pid file.
    pub async fn shutdown(&mut self) {
        self.phase = BrokerPhase::ShuttingDown;
        if let Err(e) = self.history.flush(Utc::now()) {
            warn!("final history flush failed: {e}");
        }
        let _ = self.store.clear().await;
        if let Err(e) = std::fs::remove_file(&self.pid_path) {
            debug!("pid file removal: {e}");
        }
        info!("broker stopped");
    }
}
