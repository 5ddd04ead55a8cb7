//! End-to-end handoff tests: one broker, one interface, one store
//!
//! The contract under test is the snapshot protocol: the interface sees
//! exactly what the broker published while it is fresh, and when the
//! broker is gone it senses with its OWN adapter — the broker's bus is
//! never touched by the consumer side.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use hearth::consumer::{BrokerLiveness, Interface, PerceptionSource};
use hearth::owner::{Broker, BrokerPhase};
use hearth_core::sense::ScriptedSensor;
use hearth_core::types::Reading;
use hearth_core::{Error, HearthConfig, Result, Snapshot};
use hearth_store::file::FileBackend;
use hearth_store::{SnapshotBackend, SnapshotStore};
use tempfile::TempDir;

struct BrokerDead;
impl BrokerLiveness for BrokerDead {
    fn broker_alive(&self) -> bool {
        false
    }
}

struct BrokerAlive;
impl BrokerLiveness for BrokerAlive {
    fn broker_alive(&self) -> bool {
        true
    }
}

fn reading(temp: f64, hum: f64, lux: f64, pres: f64) -> Reading {
    Reading {
        taken_at: Utc::now(),
        temperature_c: Some(temp),
        humidity_pct: Some(hum),
        lux: Some(lux),
        pressure_hpa: Some(pres),
    }
}

fn file_store(dir: &Path) -> SnapshotStore {
    SnapshotStore::with_backend(
        Box::new(FileBackend::new(dir.join("snapshot.json"))),
        Duration::from_millis(500),
    )
}

fn broker_with(
    dir: &Path,
    sensor: Arc<ScriptedSensor>,
) -> Broker {
    Broker::with_store(
        dir,
        HearthConfig::default(),
        sensor,
        "ember",
        file_store(dir),
    )
    .unwrap()
}

fn interface_with(dir: &Path, sensor: Arc<ScriptedSensor>) -> Interface {
    Interface::new(
        HearthConfig::default(),
        file_store(dir),
        Box::new(BrokerDead),
        sensor,
    )
}

// ============================================================
// Fresh handoff
// ============================================================

#[tokio::test]
async fn interface_sees_exactly_what_the_broker_published() {
    let tmp = TempDir::new().unwrap();
    let bus = Arc::new(ScriptedSensor::new(vec![Some(reading(
        25.0, 50.0, 300.0, 1010.0,
    ))]));
    let mut broker = broker_with(tmp.path(), bus.clone());

    broker.tick(Utc::now()).await;
    assert_eq!(broker.phase(), BrokerPhase::Running);

    let iface_bus = Arc::new(ScriptedSensor::new(vec![]));
    let mut iface = interface_with(tmp.path(), iface_bus.clone());
    let p = iface.perceive(Utc::now()).await;

    assert_eq!(p.source, PerceptionSource::Broker);
    assert!(!p.degraded);
    assert_eq!(p.state, broker.state());
    assert_eq!(p.identity.unwrap().id, broker.identity().id);
    assert!(p.governance.is_some(), "every tick carries a decision");
    // Fresh handoff means the interface never needed its own sensor.
    assert_eq!(iface_bus.read_count(), 0);
}

#[tokio::test]
async fn published_values_arrive_unchanged_then_expire() {
    let tmp = TempDir::new().unwrap();
    let store = file_store(tmp.path());

    // Publish known state values as the broker would.
    let state = hearth_core::InternalState::new(0.8, 0.2, 0.9, 0.5);
    let snap = Snapshot {
        written_at: Utc::now(),
        reading: Some(reading(25.0, 50.0, 300.0, 1010.0)),
        reading_stale: false,
        internal_state: state,
        identity: hearth_core::Identity::newborn("ember"),
        governance: None,
    };
    store.write(&snap).await.unwrap();

    let iface_bus = Arc::new(ScriptedSensor::new(vec![Some(reading(
        18.0, 60.0, 50.0, 1000.0,
    ))]));
    let mut iface = interface_with(tmp.path(), iface_bus.clone());

    // Within the staleness window: identical values, untouched bus.
    let p = iface.perceive(snap.written_at + ChronoDuration::seconds(3)).await;
    assert_eq!(p.source, PerceptionSource::Broker);
    assert_eq!(p.state, state);
    assert_eq!(iface_bus.read_count(), 0);

    // Past the window with no new write: direct sensing takes over.
    let p = iface.perceive(snap.written_at + ChronoDuration::seconds(30)).await;
    assert_eq!(p.source, PerceptionSource::Direct);
    assert_eq!(iface_bus.read_count(), 1);
}

#[tokio::test]
async fn broker_holds_state_through_a_failed_read() {
    let tmp = TempDir::new().unwrap();
    let bus = Arc::new(ScriptedSensor::new(vec![
        Some(reading(25.0, 50.0, 300.0, 1010.0)),
        None,
    ]));
    let mut broker = broker_with(tmp.path(), bus);

    broker.tick(Utc::now()).await;
    let settled = broker.state();
    broker.tick(Utc::now()).await;
    assert_eq!(broker.state(), settled, "failed read must hold, not reset");

    let store = file_store(tmp.path());
    let snap = store.read().await.unwrap().unwrap();
    assert!(snap.reading_stale);
    assert!(snap.reading.is_none());
}

// ============================================================
// Broker gone: direct sensing, bus exclusivity
// ============================================================

#[tokio::test]
async fn stale_snapshot_falls_back_to_the_interfaces_own_sensor() {
    let tmp = TempDir::new().unwrap();
    let broker_bus = Arc::new(ScriptedSensor::new(vec![Some(reading(
        25.0, 50.0, 300.0, 1010.0,
    ))]));
    let mut broker = broker_with(tmp.path(), broker_bus.clone());

    // A tick from a minute ago: well past the 10s staleness bound.
    broker.tick(Utc::now() - ChronoDuration::seconds(60)).await;
    assert_eq!(broker_bus.read_count(), 1);

    let iface_bus = Arc::new(ScriptedSensor::new(vec![Some(reading(
        18.0, 60.0, 50.0, 1000.0,
    ))]));
    let mut iface = interface_with(tmp.path(), iface_bus.clone());
    let p = iface.perceive(Utc::now()).await;

    assert_eq!(p.source, PerceptionSource::Direct);
    assert!(p.identity.is_none());
    assert_eq!(iface_bus.read_count(), 1);
    // Exclusivity: the fallback never reaches through the broker's bus.
    assert_eq!(broker_bus.read_count(), 1);
}

#[tokio::test]
async fn absent_snapshot_senses_directly() {
    let tmp = TempDir::new().unwrap();
    let iface_bus = Arc::new(ScriptedSensor::new(vec![Some(reading(
        18.0, 60.0, 50.0, 1000.0,
    ))]));
    let mut iface = interface_with(tmp.path(), iface_bus.clone());

    let p = iface.perceive(Utc::now()).await;
    assert_eq!(p.source, PerceptionSource::Direct);
    assert!(!p.degraded);
    assert_eq!(iface_bus.read_count(), 1);
}

#[tokio::test]
async fn direct_perception_with_a_dead_sensor_is_degraded_but_answers() {
    let tmp = TempDir::new().unwrap();
    let iface_bus = Arc::new(ScriptedSensor::new(vec![]));
    let mut iface = interface_with(tmp.path(), iface_bus);

    let p = iface.perceive(Utc::now()).await;
    assert_eq!(p.source, PerceptionSource::Direct);
    assert!(p.degraded);
    // The resting state still comes back; perception never errors out.
    assert_eq!(p.state, hearth_core::InternalState::resting());
}

#[tokio::test]
async fn live_broker_keeps_the_bus_even_when_not_publishing() {
    // Nothing in the store, but the broker is confirmed running (e.g.
    // wedged mid-start). The interface must serve last-known state and
    // leave the bus alone.
    let tmp = TempDir::new().unwrap();
    let iface_bus = Arc::new(ScriptedSensor::new(vec![Some(reading(
        18.0, 60.0, 50.0, 1000.0,
    ))]));
    let mut iface = Interface::new(
        HearthConfig::default(),
        file_store(tmp.path()),
        Box::new(BrokerAlive),
        iface_bus.clone(),
    );

    let p = iface.perceive(Utc::now()).await;
    assert_eq!(p.source, PerceptionSource::LastKnown);
    assert!(p.degraded);
    assert_eq!(p.state, hearth_core::InternalState::resting());
    assert_eq!(
        iface_bus.read_count(),
        0,
        "interface touched the bus while the broker was confirmed alive"
    );
}

#[tokio::test]
async fn interface_never_writes_the_store() {
    let tmp = TempDir::new().unwrap();
    let broker_bus = Arc::new(ScriptedSensor::new(vec![Some(reading(
        25.0, 50.0, 300.0, 1010.0,
    ))]));
    let mut broker = broker_with(tmp.path(), broker_bus);
    let written_at = Utc::now() - ChronoDuration::seconds(60);
    broker.tick(written_at).await;

    let iface_bus = Arc::new(ScriptedSensor::new(vec![Some(reading(
        18.0, 60.0, 50.0, 1000.0,
    ))]));
    let mut iface = interface_with(tmp.path(), iface_bus);
    let p = iface.perceive(Utc::now()).await;
    assert_eq!(p.source, PerceptionSource::Direct);

    // The stale snapshot is untouched: same timestamp the broker wrote.
    let snap = file_store(tmp.path()).read().await.unwrap().unwrap();
    assert_eq!(snap.written_at, written_at);
}

// ============================================================
// Lifecycle
// ============================================================

#[tokio::test]
async fn shutdown_clears_the_snapshot_and_pid_file() {
    let tmp = TempDir::new().unwrap();
    let bus = Arc::new(ScriptedSensor::new(vec![Some(reading(
        25.0, 50.0, 300.0, 1010.0,
    ))]));
    let mut broker = broker_with(tmp.path(), bus);

    broker.tick(Utc::now()).await;
    assert!(tmp.path().join("broker.pid").exists());

    broker.shutdown().await;
    let remaining = file_store(tmp.path()).read().await.unwrap();
    assert!(remaining.is_none(), "a stopped broker leaves no snapshot");
    assert!(!tmp.path().join("broker.pid").exists());
    assert!(
        tmp.path().join("history.json").exists(),
        "history survives shutdown"
    );
}

#[tokio::test]
async fn identity_survives_broker_restarts() {
    let tmp = TempDir::new().unwrap();
    let first = {
        let bus = Arc::new(ScriptedSensor::new(vec![Some(reading(
            25.0, 50.0, 300.0, 1010.0,
        ))]));
        let mut broker = broker_with(tmp.path(), bus);
        broker.tick(Utc::now()).await;
        let id = broker.identity().clone();
        broker.shutdown().await;
        id
    };

    let bus = Arc::new(ScriptedSensor::new(vec![Some(reading(
        25.0, 50.0, 300.0, 1010.0,
    ))]));
    let broker = broker_with(tmp.path(), bus);
    assert_eq!(broker.identity().id, first.id);
    assert_eq!(broker.identity().awakenings, first.awakenings + 1);
}

#[tokio::test]
async fn corrupt_identity_runs_degraded_but_keeps_publishing() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("identity.json"), "garbage").unwrap();

    let bus = Arc::new(ScriptedSensor::new(vec![Some(reading(
        25.0, 50.0, 300.0, 1010.0,
    ))]));
    let mut broker = broker_with(tmp.path(), bus);
    assert!(broker.identity().is_fallback());

    broker.tick(Utc::now()).await;
    assert_eq!(broker.phase(), BrokerPhase::Degraded);
    // Degraded w.r.t. identity only: the snapshot still flows.
    let snap = file_store(tmp.path()).read().await.unwrap().unwrap();
    assert!(snap.identity.is_fallback());
}

// ============================================================
// Store failure: degraded, not dead
// ============================================================

struct RejectingBackend;

#[async_trait::async_trait]
impl SnapshotBackend for RejectingBackend {
    async fn write(&self, _snapshot: &Snapshot) -> Result<()> {
        Err(Error::store_write("disk on fire"))
    }
    async fn read(&self) -> Result<Option<Snapshot>> {
        Ok(None)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    fn name(&self) -> &'static str {
        "rejecting"
    }
}

#[tokio::test]
async fn failed_snapshot_write_degrades_but_keeps_ticking() {
    let tmp = TempDir::new().unwrap();
    let bus = Arc::new(ScriptedSensor::new(vec![
        Some(reading(25.0, 50.0, 300.0, 1010.0)),
        Some(reading(25.1, 50.0, 300.0, 1010.0)),
    ]));
    let store = SnapshotStore::with_backend(
        Box::new(RejectingBackend),
        Duration::from_millis(500),
    );
    let mut broker = Broker::with_store(
        tmp.path(),
        HearthConfig::default(),
        bus.clone(),
        "ember",
        store,
    )
    .unwrap();

    broker.tick(Utc::now()).await;
    assert_eq!(broker.phase(), BrokerPhase::Degraded);
    // The loop keeps sensing and deriving regardless.
    broker.tick(Utc::now()).await;
    assert_eq!(bus.read_count(), 2);
    assert_eq!(broker.phase(), BrokerPhase::Degraded);
}
