//! The interface — stateless consumer of the shared state
//!
//! Perception comes from the freshest snapshot; the sensor bus belongs to
//! the broker. Only when the snapshot is stale or absent AND the broker
//! is demonstrably not running does the interface sense directly, with
//! its own adapter, and even then it never writes the store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use hearth_core::config::HearthConfig;
use hearth_core::{GovernanceDecision, Identity, InternalState, SensorAdapter, Snapshot};
use hearth_store::SnapshotStore;

/// Seam for "is the broker process actually up?". Consulted only when
/// the snapshot fails the freshness check.
pub trait BrokerLiveness: Send + Sync {
    fn broker_alive(&self) -> bool;
}

/// Liveness from the broker's pid file. No pid file means no broker; a
/// pid that no longer exists in the process table means a crashed one.
pub struct PidFileLiveness {
    path: PathBuf,
}

impl PidFileLiveness {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("broker.pid"),
        }
    }
}

impl BrokerLiveness for PidFileLiveness {
    fn broker_alive(&self) -> bool {
        let pid = match std::fs::read_to_string(&self.path) {
            Ok(content) => match content.trim().parse::<u32>() {
                Ok(pid) => pid,
                Err(_) => return false,
            },
            Err(_) => return false,
        };
        // Where a process table is mounted, check it; otherwise the pid
        // file itself is the best signal available.
        let proc_root = Path::new("/proc");
        if proc_root.is_dir() {
            proc_root.join(pid.to_string()).is_dir()
        } else {
            true
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerceptionSource {
    /// State adopted from a fresh broker snapshot.
    Broker,
    /// The broker is alive but not publishing; the last adopted state is
    /// served rather than contending for its bus.
    LastKnown,
    /// State derived locally because no live broker is publishing.
    Direct,
}

#[derive(Debug, Clone)]
pub struct Perception {
    pub state: InternalState,
    /// Present only when perceiving through the broker.
    pub identity: Option<Identity>,
    pub governance: Option<GovernanceDecision>,
    pub source: PerceptionSource,
    /// The underlying reading was missing (broker bus failure, or a
    /// failed direct read holding the previous state).
    pub degraded: bool,
}

pub struct Interface {
    cfg: HearthConfig,
    store: SnapshotStore,
    liveness: Box<dyn BrokerLiveness>,
    fallback_sensor: Arc<dyn SensorAdapter>,
    state: InternalState,
    started_at: DateTime<Utc>,
}

impl Interface {
    pub fn new(
        cfg: HearthConfig,
        store: SnapshotStore,
        liveness: Box<dyn BrokerLiveness>,
        fallback_sensor: Arc<dyn SensorAdapter>,
    ) -> Self {
        Self {
            cfg,
            store,
            liveness,
            fallback_sensor,
            state: InternalState::resting(),
            started_at: Utc::now(),
        }
    }

    /// One perception. Fresh snapshot wins; a stale one with a live
    /// broker earns a brief retry (the broker may be mid-tick). Direct
    /// sensing happens only once the broker is confirmed not running —
    /// the bus has exactly one accessor while an owner exists.
    pub async fn perceive(&mut self, now: DateTime<Utc>) -> Perception {
        if let Some(snap) = self.fresh_snapshot(now).await {
            return self.adopt(snap);
        }

        if self.liveness.broker_alive() {
            debug!("snapshot not fresh but broker alive, retrying once");
            tokio::time::sleep(Duration::from_secs_f64(
                self.cfg.broker.tick_interval_secs / 2.0,
            ))
            .await;
            if let Some(snap) = self.fresh_snapshot(Utc::now()).await {
                return self.adopt(snap);
            }
            // The broker may have died during the retry window; only a
            // confirmed-dead broker releases the bus to us.
            if self.liveness.broker_alive() {
                warn!("broker alive but not publishing, holding last-known state");
                return Perception {
                    state: self.state,
                    identity: None,
                    governance: None,
                    source: PerceptionSource::LastKnown,
                    degraded: true,
                };
            }
        }

        self.perceive_directly()
    }

    async fn fresh_snapshot(&self, now: DateTime<Utc>) -> Option<Snapshot> {
        match self.store.read().await {
            Ok(Some(snap)) => {
                let age = snap.age_secs(now);
                if age <= self.cfg.store.staleness_secs {
                    Some(snap)
                } else {
                    warn!(age_secs = age, "snapshot is stale");
                    None
                }
            }
            Ok(None) => {
                let since_start = (now - self.started_at).num_milliseconds() as f64 / 1000.0;
                if since_start < self.cfg.broker.grace_period_secs {
                    // Normal during startup racing: the broker may simply
                    // not have ticked yet.
                    debug!("no snapshot yet (within grace period)");
                } else {
                    info!("no snapshot present");
                }
                None
            }
            Err(e) => {
                warn!("snapshot read failed: {e}");
                None
            }
        }
    }

    fn adopt(&mut self, snap: Snapshot) -> Perception {
        self.state = snap.internal_state;
        Perception {
            state: snap.internal_state,
            identity: Some(snap.identity),
            governance: snap.governance,
            source: PerceptionSource::Broker,
            degraded: snap.reading_stale,
        }
    }

    fn perceive_directly(&mut self) -> Perception {
        let reading = self.fallback_sensor.read().filter(|r| !r.is_empty());
        let degraded = reading.is_none();
        if let Some(r) = &reading {
            self.state = InternalState::derive(r, &self.state, &self.cfg.state);
        }
        debug!(sensor = self.fallback_sensor.name(), degraded, "perceiving directly");
        Perception {
            state: self.state,
            identity: None,
            governance: None,
            source: PerceptionSource::Direct,
            degraded,
        }
    }
}
