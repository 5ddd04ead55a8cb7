//! Continuity monitor — two-tier anomaly and drift detection
//!
//! Short horizon: the signature now versus the signature from a few
//! minutes ago (coherence). Long horizon: the signature now versus the
//! frozen genesis anchor (lineage). A coherence collapse is an anomaly —
//! something broke suddenly. Intact coherence with eroded lineage is
//! drift — the agent changed slowly, which may be corruption or may be
//! growing up. The two verdicts are deliberately distinct.

use std::collections::VecDeque;
use std::path::Path;

use chrono::{DateTime, Utc};
use hearth_core::config::TrajectoryConfig;
use hearth_core::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::signature::{AdaptiveWeights, SimilarityReport, TrajectorySignature};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuityVerdict {
    /// Below the observation floor; alerts suppressed.
    Immature,
    Stable,
    /// Short-horizon coherence collapsed: sudden corruption.
    Anomaly,
    /// Coherence intact but lineage eroded: gradual departure from the
    /// genesis anchor.
    Drift,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContinuityReport {
    /// Similarity to the signature from ~coherence_lag seconds ago.
    pub coherence: Option<f64>,
    /// Similarity to the frozen genesis anchor.
    pub lineage: Option<f64>,
    pub verdict: ContinuityVerdict,
    pub confidence: f64,
}

/// The immutable anchor captured at creation/fork time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisRecord {
    pub signature: TrajectorySignature,
    pub sealed_at: DateTime<Utc>,
}

/// Load the genesis record, or seal the provided signature as genesis if
/// none exists yet. An existing record is never overwritten — corrupt
/// files are reported, not replaced, since silently re-anchoring would
/// defeat long-horizon drift detection.
pub fn load_or_seal_genesis(path: &Path, candidate: &TrajectorySignature) -> Result<GenesisRecord> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let record: GenesisRecord = serde_json::from_str(&content)?;
            Ok(record)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let record = GenesisRecord {
                signature: candidate.clone(),
                sealed_at: Utc::now(),
            };
            let json = serde_json::to_vec_pretty(&record)?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let tmp = path.with_extension("json.tmp");
            std::fs::write(&tmp, &json)?;
            std::fs::rename(&tmp, path)?;
            info!(path = %path.display(), "sealed genesis signature");
            Ok(record)
        }
        Err(e) => Err(e.into()),
    }
}

pub struct ContinuityMonitor {
    genesis: Option<TrajectorySignature>,
    /// Recent signatures, oldest first, pruned past twice the lag.
    recent: VecDeque<(DateTime<Utc>, TrajectorySignature)>,
    adaptive: AdaptiveWeights,
    cfg: TrajectoryConfig,
}

impl ContinuityMonitor {
    pub fn new(cfg: TrajectoryConfig) -> Self {
        Self {
            genesis: None,
            recent: VecDeque::new(),
            adaptive: AdaptiveWeights::new(cfg.weights, cfg.adaptive_recompute_every),
            cfg,
        }
    }

    pub fn set_genesis(&mut self, genesis: TrajectorySignature) {
        self.genesis = Some(genesis);
    }

    pub fn has_genesis(&self) -> bool {
        self.genesis.is_some()
    }

    /// Assess the current signature against both horizons and remember it
    /// for future short-horizon comparisons.
    pub fn assess(&mut self, now: DateTime<Utc>, current: &TrajectorySignature) -> ContinuityReport {
        let weights = self.adaptive.current();

        let coherence_report = self.lagged_signature(now).map(|past| current.similarity(past, &weights));
        let coherence = coherence_report.as_ref().and_then(|r| r.overall);

        let lineage_report: Option<SimilarityReport> = self
            .genesis
            .as_ref()
            .map(|anchor| current.similarity(anchor, &weights));
        let lineage = lineage_report.as_ref().and_then(|r| r.overall);

        if let Some(r) = &coherence_report {
            self.adaptive.observe(r);
        }

        let confidence = current.confidence(self.cfg.confidence_floor);
        let verdict = if confidence < 1.0 {
            ContinuityVerdict::Immature
        } else if matches!(coherence, Some(c) if c < self.cfg.anomaly_threshold) {
            ContinuityVerdict::Anomaly
        } else if matches!(lineage, Some(l) if l < self.cfg.drift_threshold) {
            ContinuityVerdict::Drift
        } else {
            ContinuityVerdict::Stable
        };

        if verdict == ContinuityVerdict::Anomaly {
            warn!(?coherence, "trajectory coherence collapsed");
        }

        self.remember(now, current.clone());

        ContinuityReport {
            coherence,
            lineage,
            verdict,
            confidence,
        }
    }

    /// Newest remembered signature at least `coherence_lag_secs` old.
    fn lagged_signature(&self, now: DateTime<Utc>) -> Option<&TrajectorySignature> {
        let lag = self.cfg.coherence_lag_secs;
        self.recent
            .iter()
            .rev()
            .find(|(t, _)| (now - *t).num_milliseconds() as f64 / 1000.0 >= lag)
            .map(|(_, s)| s)
    }

    fn remember(&mut self, now: DateTime<Utc>, sig: TrajectorySignature) {
        self.recent.push_back((now, sig));
        let horizon = self.cfg.coherence_lag_secs * 2.0;
        while let Some((t, _)) = self.recent.front() {
            let age = (now - *t).num_milliseconds() as f64 / 1000.0;
            // Keep at least one entry past the lag so a comparison target
            // always survives pruning.
            if age > horizon && self.recent.len() > 2 {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}
