//! The 4-metric vector sent to the decision service
//!
//! A fixed, clamped projection of the internal state, optionally blended
//! with an auxiliary signal (e.g. a trajectory-continuity score mapped
//! into the same shape). The primary state always carries the majority
//! weight.

use hearth_core::InternalState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricVector {
    /// Overall arousal/engagement.
    pub activation: f64,
    /// Disorder: high when stability is low.
    pub entropy: f64,
    pub positive_affect: f64,
    pub negative_affect: f64,
}

impl MetricVector {
    pub fn new(activation: f64, entropy: f64, positive_affect: f64, negative_affect: f64) -> Self {
        Self {
            activation: clamp(activation),
            entropy: clamp(entropy),
            positive_affect: clamp(positive_affect),
            negative_affect: clamp(negative_affect),
        }
    }

    /// Project the internal state, blending in the auxiliary vector at
    /// `aux_weight` (clamped so the primary mapping keeps the majority).
    pub fn from_state(state: &InternalState, aux: Option<[f64; 4]>, aux_weight: f64) -> Self {
        let primary = Self::new(
            0.5 * state.warmth + 0.5 * state.presence,
            1.0 - state.stability,
            0.5 * (state.warmth + state.clarity),
            1.0 - 0.5 * (state.clarity + state.stability),
        );
        match aux {
            None => primary,
            Some(a) => {
                let w = aux_weight.clamp(0.0, 0.49);
                let p = primary.as_array();
                Self::new(
                    (1.0 - w) * p[0] + w * clamp(a[0]),
                    (1.0 - w) * p[1] + w * clamp(a[1]),
                    (1.0 - w) * p[2] + w * clamp(a[2]),
                    (1.0 - w) * p[3] + w * clamp(a[3]),
                )
            }
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [
            self.activation,
            self.entropy,
            self.positive_affect,
            self.negative_affect,
        ]
    }

    /// Signed gap between positive and negative affect, in [-1, 1].
    pub fn affect_imbalance(&self) -> f64 {
        self.positive_affect - self.negative_affect
    }
}

fn clamp(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
