//! Attractor basin — the statistical home region of the state trajectory
//!
//! Mean and covariance over the most recent window of history samples.
//! The covariance is regularized with epsilon on the diagonal at
//! construction, so inversion is always defined even for a window where
//! the agent sat perfectly still. The dimension count is fixed at four;
//! the linear algebra is written out directly rather than pulling in a
//! matrix crate.

use chrono::{DateTime, Utc};
use hearth_core::{HistorySample, InternalState};
use serde::{Deserialize, Serialize};

pub const DIMS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttractorBasin {
    pub mean: [f64; DIMS],
    /// Regularized covariance: epsilon·I was already added.
    pub cov: [[f64; DIMS]; DIMS],
    pub samples: usize,
    pub computed_at: DateTime<Utc>,
}

impl AttractorBasin {
    /// Compute from a window of samples, newest window only — callers pass
    /// `ring.window(n)`. Returns `None` below the validity floor.
    pub fn from_window(window: &[HistorySample], min_samples: usize, epsilon: f64) -> Option<Self> {
        let n = window.len();
        if n < min_samples.max(2) {
            return None;
        }

        let mut mean = [0.0; DIMS];
        for s in window {
            let v = s.state.as_array();
            for (m, x) in mean.iter_mut().zip(v.iter()) {
                *m += x;
            }
        }
        for m in mean.iter_mut() {
            *m /= n as f64;
        }

        let mut cov = [[0.0; DIMS]; DIMS];
        for s in window {
            let v = s.state.as_array();
            for i in 0..DIMS {
                for j in 0..DIMS {
                    cov[i][j] += (v[i] - mean[i]) * (v[j] - mean[j]);
                }
            }
        }
        let denom = (n - 1) as f64;
        for (i, row) in cov.iter_mut().enumerate() {
            for (j, c) in row.iter_mut().enumerate() {
                *c /= denom;
                if i == j {
                    *c += epsilon.max(f64::MIN_POSITIVE);
                }
            }
        }

        Some(Self {
            mean,
            cov,
            samples: n,
            computed_at: Utc::now(),
        })
    }

    /// Euclidean distance from the basin mean, the metric used to detect
    /// perturbation episodes.
    pub fn distance_from_mean(&self, state: &InternalState) -> f64 {
        let v = state.as_array();
        self.mean
            .iter()
            .zip(v.iter())
            .map(|(m, x)| (m - x) * (m - x))
            .sum::<f64>()
            .sqrt()
    }

    /// Mahalanobis distance, using the regularized covariance.
    pub fn mahalanobis(&self, state: &InternalState) -> f64 {
        let inv = invert(&self.cov);
        let v = state.as_array();
        let mut d = [0.0; DIMS];
        for i in 0..DIMS {
            d[i] = v[i] - self.mean[i];
        }
        quadratic_form(&d, &inv).max(0.0).sqrt()
    }

    /// Bhattacharyya similarity between two basins treated as Gaussians:
    /// the Bhattacharyya distance exponentiated back into (0, 1].
    pub fn bhattacharyya(&self, other: &AttractorBasin) -> f64 {
        let mut mixed = [[0.0; DIMS]; DIMS];
        for i in 0..DIMS {
            for j in 0..DIMS {
                mixed[i][j] = 0.5 * (self.cov[i][j] + other.cov[i][j]);
            }
        }
        let inv = invert(&mixed);
        let mut d = [0.0; DIMS];
        for i in 0..DIMS {
            d[i] = self.mean[i] - other.mean[i];
        }

        let mean_term = quadratic_form(&d, &inv) / 8.0;

        let det_mixed = determinant(&mixed).max(f64::MIN_POSITIVE);
        let det_a = determinant(&self.cov).max(f64::MIN_POSITIVE);
        let det_b = determinant(&other.cov).max(f64::MIN_POSITIVE);
        let cov_term = 0.5 * (det_mixed / (det_a * det_b).sqrt()).ln();

        (-(mean_term + cov_term.max(0.0))).exp().clamp(0.0, 1.0)
    }
}

/// 4x4 inverse by Gauss-Jordan with partial pivoting. On a degenerate
/// pivot the diagonal is re-regularized and the elimination restarts; the
/// final resort is the diagonal-only inverse. A singular-matrix error
/// never escapes this module.
fn invert(m: &[[f64; DIMS]; DIMS]) -> [[f64; DIMS]; DIMS] {
    let mut boost = 0.0;
    for _ in 0..4 {
        if let Some(inv) = try_invert(m, boost) {
            return inv;
        }
        boost = if boost == 0.0 { 1e-9 } else { boost * 1000.0 };
    }
    let mut diag = [[0.0; DIMS]; DIMS];
    for i in 0..DIMS {
        diag[i][i] = 1.0 / m[i][i].abs().max(f64::MIN_POSITIVE);
    }
    diag
}

fn try_invert(m: &[[f64; DIMS]; DIMS], boost: f64) -> Option<[[f64; DIMS]; DIMS]> {
    let mut a = *m;
    for i in 0..DIMS {
        a[i][i] += boost;
    }
    let mut inv = [[0.0; DIMS]; DIMS];
    for i in 0..DIMS {
        inv[i][i] = 1.0;
    }

    for col in 0..DIMS {
        // Partial pivot: largest magnitude in this column at or below row `col`.
        let pivot_row = (col..DIMS)
            .max_by(|&r1, &r2| {
                a[r1][col]
                    .abs()
                    .partial_cmp(&a[r2][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[pivot_row][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = a[col][col];
        for j in 0..DIMS {
            a[col][j] /= pivot;
            inv[col][j] /= pivot;
        }
        for row in 0..DIMS {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            for j in 0..DIMS {
                a[row][j] -= factor * a[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }
    Some(inv)
}

/// Determinant via Gaussian elimination (product of pivots).
fn determinant(m: &[[f64; DIMS]; DIMS]) -> f64 {
    let mut a = *m;
    let mut det = 1.0;
    for col in 0..DIMS {
        let pivot_row = (col..DIMS)
            .max_by(|&r1, &r2| {
                a[r1][col]
                    .abs()
                    .partial_cmp(&a[r2][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[pivot_row][col].abs() < f64::MIN_POSITIVE {
            return 0.0;
        }
        if pivot_row != col {
            a.swap(col, pivot_row);
            det = -det;
        }
        det *= a[col][col];
        for row in (col + 1)..DIMS {
            let factor = a[row][col] / a[col][col];
            for j in col..DIMS {
                a[row][j] -= factor * a[col][j];
            }
        }
    }
    det
}

fn quadratic_form(d: &[f64; DIMS], m: &[[f64; DIMS]; DIMS]) -> f64 {
    let mut acc = 0.0;
    for i in 0..DIMS {
        for j in 0..DIMS {
            acc += d[i] * m[i][j] * d[j];
        }
    }
    acc
}
