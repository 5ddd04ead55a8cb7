//! Trajectory signature — the composite behavioral fingerprint
//!
//! Six components, any of which may be absent on a cold start: preference
//! and belief vectors, the attractor basin, the recovery profile,
//! relational stats, and the long-horizon equilibrium set-point used by
//! the homeostatic term. Similarity is a weighted sum over the components
//! present in BOTH signatures, with absent components' weight
//! redistributed proportionally — a missing component says "no evidence",
//! not "no match".

use chrono::{DateTime, Utc};
use hearth_core::config::{SignatureWeights, TrajectoryConfig};
use hearth_core::HistorySample;
use serde::{Deserialize, Serialize};

use crate::basin::{AttractorBasin, DIMS};
use crate::recovery::RecoveryProfile;

pub const COMPONENTS: usize = 6;

pub const COMPONENT_NAMES: [&str; COMPONENTS] = [
    "preference",
    "belief",
    "attractor",
    "recovery",
    "relational",
    "homeostatic",
];

/// Summary of the agent's relationships: how many interactions it has
/// had, and the tendency of their emotional valence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelationalStats {
    pub interactions: u64,
    /// Mean valence in [-1, 1].
    pub valence_tendency: f64,
    /// Familiarity with its most-known counterpart, in [0, 1].
    pub familiarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySignature {
    #[serde(default)]
    pub preferences: Option<Vec<f64>>,
    #[serde(default)]
    pub beliefs: Option<Vec<f64>>,
    #[serde(default)]
    pub basin: Option<AttractorBasin>,
    #[serde(default)]
    pub recovery: Option<RecoveryProfile>,
    #[serde(default)]
    pub relational: Option<RelationalStats>,
    /// Long-horizon mean state — the set-point the homeostatic term
    /// compares, distinct from the basin's recent-window mean.
    #[serde(default)]
    pub equilibrium: Option<[f64; DIMS]>,
    pub observation_count: usize,
    pub computed_at: DateTime<Utc>,
}

impl TrajectorySignature {
    /// Compute from the full history plus auxiliary structured data.
    /// Cheap enough to recompute on demand; nothing here is incremental
    /// except the adaptive weighting kept in [`AdaptiveWeights`].
    pub fn compute(
        history: &[HistorySample],
        preferences: Option<Vec<f64>>,
        beliefs: Option<Vec<f64>>,
        relational: Option<RelationalStats>,
        cfg: &TrajectoryConfig,
    ) -> Self {
        let window_start = history.len().saturating_sub(cfg.basin_window);
        let basin = AttractorBasin::from_window(
            &history[window_start..],
            cfg.basin_min_samples,
            cfg.basin_epsilon,
        );

        let recovery = basin.as_ref().and_then(|b| {
            RecoveryProfile::estimate(
                history,
                b.mean,
                cfg.perturbation_threshold,
                cfg.recovery_threshold,
                cfg.min_episodes,
                cfg.max_tau_secs,
            )
        });

        let equilibrium = if history.is_empty() {
            None
        } else {
            let mut mean = [0.0; DIMS];
            for s in history {
                for (m, x) in mean.iter_mut().zip(s.state.as_array().iter()) {
                    *m += x;
                }
            }
            for m in mean.iter_mut() {
                *m /= history.len() as f64;
            }
            Some(mean)
        };

        Self {
            preferences,
            beliefs,
            basin,
            recovery,
            relational,
            equilibrium,
            observation_count: history.len(),
            computed_at: Utc::now(),
        }
    }

    /// Cold-start confidence: grows linearly to 1.0 at the observation
    /// floor (50 by default). Below 1.0, anomaly alerts are suppressed and
    /// comparisons should prefer a genesis/parent anchor.
    pub fn confidence(&self, floor: usize) -> f64 {
        if floor == 0 {
            return 1.0;
        }
        (self.observation_count as f64 / floor as f64).min(1.0)
    }

    /// Weighted similarity against another signature.
    pub fn similarity(&self, other: &TrajectorySignature, weights: &SignatureWeights) -> SimilarityReport {
        let components = [
            vector_similarity(self.preferences.as_deref(), other.preferences.as_deref()),
            vector_similarity(self.beliefs.as_deref(), other.beliefs.as_deref()),
            match (&self.basin, &other.basin) {
                (Some(a), Some(b)) => Some(a.bhattacharyya(b)),
                _ => None,
            },
            recovery_similarity(self.recovery.as_ref(), other.recovery.as_ref()),
            match (&self.relational, &other.relational) {
                // Normalized L1 on valence tendency; the [-1,1] range makes
                // the max gap 2.
                (Some(a), Some(b)) => {
                    Some(1.0 - (a.valence_tendency - b.valence_tendency).abs() / 2.0)
                }
                _ => None,
            },
            match (&self.equilibrium, &other.equilibrium) {
                (Some(a), Some(b)) => {
                    let l1: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum();
                    Some(1.0 - l1 / DIMS as f64)
                }
                _ => None,
            },
        ];

        let raw = weights.as_array();
        let present_weight: f64 = components
            .iter()
            .zip(raw.iter())
            .filter_map(|(c, w)| c.map(|_| *w))
            .sum();

        let overall = if present_weight <= 0.0 {
            None
        } else {
            // Absent components give up their weight proportionally to the
            // present ones.
            Some(
                components
                    .iter()
                    .zip(raw.iter())
                    .filter_map(|(c, w)| c.map(|s| s * w / present_weight))
                    .sum::<f64>()
                    .clamp(0.0, 1.0),
            )
        };

        SimilarityReport {
            overall,
            components,
        }
    }
}

/// Per-component scores (`None` where either side lacked the component)
/// plus the renormalized weighted overall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityReport {
    pub overall: Option<f64>,
    pub components: [Option<f64>; COMPONENTS],
}

impl SimilarityReport {
    pub fn overall_or_zero(&self) -> f64 {
        self.overall.unwrap_or(0.0)
    }
}

/// Cosine similarity remapped from [-1, 1] to [0, 1]. Absent or
/// length-mismatched vectors mean no score.
fn vector_similarity(a: Option<&[f64]>, b: Option<&[f64]>) -> Option<f64> {
    let (a, b) = (a?, b?);
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na < 1e-9 || nb < 1e-9 {
        return None;
    }
    let cos = (dot / (na * nb)).clamp(-1.0, 1.0);
    Some((cos + 1.0) / 2.0)
}

/// Time constants span orders of magnitude, so they are compared on the
/// log of their ratio: exp(-|ln(t1/t2)|), which reduces to min/max and is
/// scale-free. Averaged over the dimensions where both sides report a tau.
fn recovery_similarity(a: Option<&RecoveryProfile>, b: Option<&RecoveryProfile>) -> Option<f64> {
    let (a, b) = (a?, b?);
    let mut sum = 0.0;
    let mut n = 0usize;
    for dim in 0..DIMS {
        if let (Some(ta), Some(tb)) = (a.tau_secs[dim], b.tau_secs[dim]) {
            if ta > 0.0 && tb > 0.0 {
                sum += (-(ta / tb).ln().abs()).exp();
                n += 1;
            }
        }
    }
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Inverse-variance adaptive weighting.
///
/// Components whose similarity scores stay stable over time are more
/// diagnostic of identity than jittery ones, so weight inversely to the
/// running variance of each component's score. Variance is the one piece
/// of trajectory state maintained incrementally (Welford); the weights
/// themselves are only recomputed every `recompute_every` observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveWeights {
    count: [u64; COMPONENTS],
    mean: [f64; COMPONENTS],
    m2: [f64; COMPONENTS],
    observations: usize,
    recompute_every: usize,
    current: SignatureWeights,
}

impl AdaptiveWeights {
    pub fn new(initial: SignatureWeights, recompute_every: usize) -> Self {
        Self {
            count: [0; COMPONENTS],
            mean: [0.0; COMPONENTS],
            m2: [0.0; COMPONENTS],
            observations: 0,
            recompute_every: recompute_every.max(1),
            current: initial,
        }
    }

    pub fn current(&self) -> SignatureWeights {
        self.current
    }

    /// Fold in one similarity report's component scores.
    pub fn observe(&mut self, report: &SimilarityReport) {
        for (i, score) in report.components.iter().enumerate() {
            if let Some(s) = score {
                self.count[i] += 1;
                let delta = s - self.mean[i];
                self.mean[i] += delta / self.count[i] as f64;
                self.m2[i] += delta * (s - self.mean[i]);
            }
        }
        self.observations += 1;
        if self.observations % self.recompute_every == 0 {
            self.recompute();
        }
    }

    fn recompute(&mut self) {
        let mut inv = [0.0; COMPONENTS];
        let mut total = 0.0;
        for i in 0..COMPONENTS {
            if self.count[i] >= 2 {
                let var = self.m2[i] / (self.count[i] - 1) as f64;
                inv[i] = 1.0 / (var + 1e-4);
                total += inv[i];
            }
        }
        if total <= 0.0 {
            return; // not enough evidence yet, keep current weights
        }
        self.current = SignatureWeights {
            preference: inv[0] / total,
            belief: inv[1] / total,
            attractor: inv[2] / total,
            recovery: inv[3] / total,
            relational: inv[4] / total,
            homeostatic: inv[5] / total,
        };
        tracing::debug!(weights = ?self.current, "adaptive weights recomputed");
    }
}
