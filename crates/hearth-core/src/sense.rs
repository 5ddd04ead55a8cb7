//! Sensor adapter seam
//!
//! The broker is the only process allowed to touch the sensor bus, and it
//! reaches hardware exclusively through this trait. Driver implementations
//! live outside this workspace; what ships here is the deterministic
//! synthetic source used when no hardware is wired, plus test doubles.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::Reading;

/// One required method. A `None` is a failed read; a `Some` with absent
/// fields is a partially degraded one. Adapters must never block
/// unboundedly — a stuck peripheral is the adapter's problem to bound.
pub trait SensorAdapter: Send + Sync {
    fn read(&self) -> Option<Reading>;

    fn name(&self) -> &str {
        "sensor"
    }
}

/// Deterministic waveform source. Produces slow, plausible environmental
/// drift so the full pipeline runs without hardware.
pub struct SyntheticSensor {
    ticks: AtomicU64,
}

impl SyntheticSensor {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorAdapter for SyntheticSensor {
    fn read(&self) -> Option<Reading> {
        let t = self.ticks.fetch_add(1, Ordering::Relaxed) as f64;
        // Periods are mutually prime so the four fields drift out of phase.
        Some(Reading {
            taken_at: Utc::now(),
            temperature_c: Some(21.0 + 3.0 * (t / 97.0).sin()),
            humidity_pct: Some(45.0 + 10.0 * (t / 131.0).sin()),
            lux: Some(250.0 + 200.0 * (t / 53.0).sin().max(-0.9)),
            pressure_hpa: Some(1013.0 + 4.0 * (t / 211.0).sin()),
        })
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Replays a fixed script of readings, then fails. For tests.
pub struct ScriptedSensor {
    script: std::sync::Mutex<std::collections::VecDeque<Option<Reading>>>,
    reads: AtomicU64,
}

impl ScriptedSensor {
    pub fn new(script: Vec<Option<Reading>>) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
            reads: AtomicU64::new(0),
        }
    }

    /// How many times the bus was touched. The exclusivity tests hang off
    /// this counter.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl SensorAdapter for ScriptedSensor {
    fn read(&self) -> Option<Reading> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .flatten()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
