//! Core data model: readings, internal state, identity, and the snapshot
//! that is the only contract between the broker and interface processes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::StateConfig;

/// One sensor sample. Every field is optional — a degraded or partially
/// failed bus reports what it has and nothing more. Absent is absent;
/// fields are never zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    #[serde(default)]
    pub humidity_pct: Option<f64>,
    #[serde(default)]
    pub lux: Option<f64>,
    #[serde(default)]
    pub pressure_hpa: Option<f64>,
}

impl Reading {
    pub fn empty(taken_at: DateTime<Utc>) -> Self {
        Self {
            taken_at,
            temperature_c: None,
            humidity_pct: None,
            lux: None,
            pressure_hpa: None,
        }
    }

    /// True when no field carries a value — treated as a failed read.
    pub fn is_empty(&self) -> bool {
        self.temperature_c.is_none()
            && self.humidity_pct.is_none()
            && self.lux.is_none()
            && self.pressure_hpa.is_none()
    }

    pub fn present_fields(&self) -> usize {
        [
            self.temperature_c.is_some(),
            self.humidity_pct.is_some(),
            self.lux.is_some(),
            self.pressure_hpa.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count()
    }
}

/// The agent's four-dimensional felt state. Every dimension lives in
/// [0, 1] — construction clamps, so no consumer ever sees an out-of-range
/// or non-finite value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InternalState {
    pub warmth: f64,
    pub clarity: f64,
    pub stability: f64,
    pub presence: f64,
}

impl InternalState {
    pub fn new(warmth: f64, clarity: f64, stability: f64, presence: f64) -> Self {
        Self {
            warmth: clamp_unit(warmth),
            clarity: clamp_unit(clarity),
            stability: clamp_unit(stability),
            presence: clamp_unit(presence),
        }
    }

    /// Neutral resting state, used before the first successful read.
    pub fn resting() -> Self {
        Self::new(0.5, 0.5, 0.5, 0.5)
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.warmth, self.clarity, self.stability, self.presence]
    }

    pub fn from_array(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    /// Euclidean distance to another state, in normalized units.
    pub fn distance(&self, other: &InternalState) -> f64 {
        self.as_array()
            .iter()
            .zip(other.as_array().iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }

    /// Derive the felt state from a reading, deterministically.
    ///
    /// Each dimension normalizes one sensor field into its configured
    /// comfort band and is smoothed toward the previous state. An absent
    /// field carries the previous value for that dimension — missing data
    /// holds the state steady rather than inventing a target.
    pub fn derive(reading: &Reading, previous: &InternalState, cfg: &StateConfig) -> Self {
        let alpha = clamp_unit(cfg.smoothing);
        let blend = |prev: f64, target: Option<f64>| match target {
            Some(t) => prev + alpha * (clamp_unit(t) - prev),
            None => prev,
        };

        let warmth_t = reading
            .temperature_c
            .map(|t| band(t, cfg.temp_low_c, cfg.temp_high_c));
        let clarity_t = reading
            .lux
            .map(|l| band(l.max(0.0).ln_1p(), cfg.lux_low.ln_1p(), cfg.lux_high.ln_1p()));
        let stability_t = reading
            .pressure_hpa
            .map(|p| band(p, cfg.pressure_low_hpa, cfg.pressure_high_hpa));
        let presence_t = reading
            .humidity_pct
            .map(|h| band(h, cfg.humidity_low_pct, cfg.humidity_high_pct));

        Self::new(
            blend(previous.warmth, warmth_t),
            blend(previous.clarity, clarity_t),
            blend(previous.stability, stability_t),
            blend(previous.presence, presence_t),
        )
    }
}

/// Linear position of `v` within [lo, hi], clamped to [0, 1].
fn band(v: f64, lo: f64, hi: f64) -> f64 {
    if !v.is_finite() || hi <= lo {
        return 0.5;
    }
    clamp_unit((v - lo) / (hi - lo))
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Who this agent is. Persisted once, awakenings bumped on every broker
/// start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub awakenings: u32,
    pub born_at: DateTime<Utc>,
}

impl Identity {
    pub fn newborn(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            awakenings: 0,
            born_at: Utc::now(),
        }
    }

    /// Synthesized stand-in for when the identity store cannot be read or
    /// repaired. The fixed nil id marks the identity as degraded.
    pub fn fallback() -> Self {
        Self {
            id: Uuid::nil(),
            name: "unnamed".to_string(),
            awakenings: 0,
            born_at: Utc::now(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.id.is_nil()
    }
}

/// Where a governance decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Remote,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceDecision {
    pub action: String,
    pub margin: String,
    pub reason: String,
    pub source: DecisionSource,
}

/// The cross-process handoff record. Written atomically by the broker
/// every tick; fully replaces its predecessor. The interface judges
/// freshness from `written_at` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub written_at: DateTime<Utc>,
    /// The tick's reading, or None when the bus read failed outright.
    pub reading: Option<Reading>,
    /// Set when `internal_state` was carried over from the previous tick
    /// because the bus produced nothing.
    pub reading_stale: bool,
    pub internal_state: InternalState,
    pub identity: Identity,
    #[serde(default)]
    pub governance: Option<GovernanceDecision>,
}

impl Snapshot {
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.written_at).num_milliseconds() as f64 / 1000.0
    }
}

/// One timestamped internal-state sample in the history ring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub at: DateTime<Utc>,
    pub state: InternalState,
}
