//! Hearth configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists. The defaults were
//! chosen for one small deployment; every threshold here is a knob, not
//! a law.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HearthConfig {
    /// Broker tick loop parameters.
    pub broker: BrokerConfig,
    /// Shared state store backends and staleness.
    pub store: StoreConfig,
    /// Comfort bands mapping sensor fields to felt dimensions.
    pub state: StateConfig,
    /// History ring size and persistence cadence.
    pub history: HistoryConfig,
    /// Trajectory signature parameters.
    pub trajectory: TrajectoryConfig,
    /// Governance bridge and circuit breaker.
    pub governance: GovernanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Seconds between broker ticks.
    pub tick_interval_secs: f64,
    /// After a fresh broker start, the interface downgrades
    /// "snapshot absent" to an informational log for this long.
    pub grace_period_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// A snapshot older than this is treated as "no broker running".
    /// Roughly 5x the tick interval.
    pub staleness_secs: f64,
    /// Address of the optional shared key-value service.
    pub kv_addr: String,
    /// How long the startup probe waits for the KV service.
    pub kv_probe_timeout_ms: u64,
    /// Hard bound on every store read/write/clear.
    pub io_timeout_ms: u64,
    /// Snapshot file name under the data dir (file backend).
    pub snapshot_file: String,
}

/// Comfort bands: each sensor field maps linearly into [0,1] between its
/// low and high bound, then smooths toward the previous state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub temp_low_c: f64,
    pub temp_high_c: f64,
    pub humidity_low_pct: f64,
    pub humidity_high_pct: f64,
    /// Lux bounds are compared on a log scale.
    pub lux_low: f64,
    pub lux_high: f64,
    pub pressure_low_hpa: f64,
    pub pressure_high_hpa: f64,
    /// Per-tick smoothing factor in (0,1]; 1.0 disables smoothing.
    pub smoothing: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// In-memory ring capacity.
    pub ring_capacity: usize,
    /// Seconds between flushes to disk.
    pub flush_interval_secs: f64,
    /// At most this many samples are persisted per flush.
    pub flush_keep: usize,
    /// History file name under the data dir.
    pub history_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Samples in the attractor basin window.
    pub basin_window: usize,
    /// Minimum samples before a basin is considered valid.
    pub basin_min_samples: usize,
    /// Covariance regularization added before inversion.
    pub basin_epsilon: f64,
    /// Distance from basin mean that opens a perturbation episode.
    pub perturbation_threshold: f64,
    /// Distance below which an episode counts as recovered.
    pub recovery_threshold: f64,
    /// Valid episodes required before a dimension reports a tau.
    pub min_episodes: usize,
    /// Fitted taus above this are discarded as nonsense.
    pub max_tau_secs: f64,
    /// Similarity component weights.
    pub weights: SignatureWeights,
    /// Short-horizon coherence below this flags an anomaly.
    pub anomaly_threshold: f64,
    /// Long-horizon lineage below this (with coherence intact) flags drift.
    pub drift_threshold: f64,
    /// Coherence compares against the signature from this many seconds ago.
    pub coherence_lag_secs: f64,
    /// Observations below this floor suppress anomaly alerts entirely.
    pub confidence_floor: usize,
    /// Adaptive weights are recomputed every this many observations.
    pub adaptive_recompute_every: usize,
}

/// Similarity component weights. Renormalized over whichever components
/// are actually present when two signatures are compared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureWeights {
    pub preference: f64,
    pub belief: f64,
    pub attractor: f64,
    pub recovery: f64,
    pub relational: f64,
    pub homeostatic: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Remote decision endpoint. Empty string disables remote calls
    /// entirely (local fallback only).
    pub endpoint: String,
    /// Hard timeout on the remote call.
    pub timeout_secs: f64,
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// Seconds the breaker stays open before one half-open probe.
    pub cooldown_secs: f64,
    /// Minority blend weight for the auxiliary signal (primary state gets
    /// the remainder).
    pub aux_weight: f64,
    /// Fallback rule: entropy above this recommends a pause.
    pub entropy_pause_threshold: f64,
    /// Fallback rule: |positive - negative| affect above this recommends
    /// a pause.
    pub imbalance_pause_threshold: f64,
}

// ============================================================
// Defaults
// ============================================================

impl Default for HearthConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            store: StoreConfig::default(),
            state: StateConfig::default(),
            history: HistoryConfig::default(),
            trajectory: TrajectoryConfig::default(),
            governance: GovernanceConfig::default(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 2.0,
            grace_period_secs: 15.0,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            staleness_secs: 10.0,
            kv_addr: "127.0.0.1:7233".into(),
            kv_probe_timeout_ms: 250,
            io_timeout_ms: 500,
            snapshot_file: "snapshot.json".into(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            temp_low_c: 10.0,
            temp_high_c: 30.0,
            humidity_low_pct: 20.0,
            humidity_high_pct: 70.0,
            lux_low: 5.0,
            lux_high: 2000.0,
            pressure_low_hpa: 980.0,
            pressure_high_hpa: 1040.0,
            smoothing: 0.3,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 2000,
            flush_interval_secs: 300.0,
            flush_keep: 500,
            history_file: "history.json".into(),
        }
    }
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            basin_window: 100,
            basin_min_samples: 50,
            basin_epsilon: 1e-6,
            perturbation_threshold: 0.15,
            recovery_threshold: 0.05,
            min_episodes: 3,
            max_tau_secs: 3600.0,
            weights: SignatureWeights::default(),
            anomaly_threshold: 0.70,
            drift_threshold: 0.60,
            coherence_lag_secs: 600.0,
            confidence_floor: 50,
            adaptive_recompute_every: 100,
        }
    }
}

impl Default for SignatureWeights {
    fn default() -> Self {
        Self {
            preference: 0.15,
            belief: 0.15,
            attractor: 0.25,
            recovery: 0.20,
            relational: 0.10,
            homeostatic: 0.15,
        }
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_secs: 3.0,
            failure_threshold: 3,
            cooldown_secs: 90.0,
            aux_weight: 0.3,
            entropy_pause_threshold: 0.85,
            imbalance_pause_threshold: 0.6,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl HearthConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} — using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} — using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

impl SignatureWeights {
    pub fn as_array(&self) -> [f64; 6] {
        [
            self.preference,
            self.belief,
            self.attractor,
            self.recovery,
            self.relational,
            self.homeostatic,
        ]
    }
}
