//! Recovery profile — return-to-equilibrium dynamics
//!
//! A perturbation episode opens when a sample's distance from the basin
//! mean crosses the perturbation threshold, and closes when it falls back
//! under the recovery threshold. Within each closed episode the per-dim
//! decay `x(t) = mu - (mu - x0)·e^(-t/tau)` is fitted log-linearly. A tau
//! is only reported for a dimension once enough episodes produced a sane
//! fit; "not enough evidence" is absence, never zero.

use chrono::{DateTime, Utc};
use hearth_core::HistorySample;
use serde::{Deserialize, Serialize};

use crate::basin::DIMS;

/// Minimum per-dimension displacement for an episode to say anything
/// about that dimension.
const MIN_DISPLACEMENT: f64 = 0.05;
/// Minimum usable points for a log-linear fit.
const MIN_FIT_POINTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryProfile {
    /// Per-dimension time constant in seconds; `None` where fewer than the
    /// required number of episodes produced a valid fit.
    pub tau_secs: [Option<f64>; DIMS],
    /// Complete perturbation-recovery episodes found in the series.
    pub episodes: usize,
    pub computed_at: DateTime<Utc>,
}

impl RecoveryProfile {
    /// Estimate from a sample series against a basin mean. Returns `None`
    /// when fewer than `min_episodes` complete episodes exist — the
    /// profile as a whole is absent, not zeroed.
    pub fn estimate(
        samples: &[HistorySample],
        mean: [f64; DIMS],
        perturbation_threshold: f64,
        recovery_threshold: f64,
        min_episodes: usize,
        max_tau_secs: f64,
    ) -> Option<Self> {
        let episodes = detect_episodes(samples, mean, perturbation_threshold, recovery_threshold);
        if episodes.len() < min_episodes {
            return None;
        }

        let mut fits: [Vec<f64>; DIMS] = Default::default();
        for episode in &episodes {
            for dim in 0..DIMS {
                if let Some(tau) = fit_tau(episode, mean[dim], dim, max_tau_secs) {
                    fits[dim].push(tau);
                }
            }
        }

        let mut tau_secs = [None; DIMS];
        for (dim, taus) in fits.iter_mut().enumerate() {
            if taus.len() >= min_episodes {
                taus.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                tau_secs[dim] = Some(taus[taus.len() / 2]);
            }
        }

        Some(Self {
            tau_secs,
            episodes: episodes.len(),
            computed_at: Utc::now(),
        })
    }

    pub fn any_tau(&self) -> bool {
        self.tau_secs.iter().any(|t| t.is_some())
    }
}

/// A closed perturbation episode: the samples from the first excursion
/// past the perturbation threshold up to (and including) the first sample
/// back inside the recovery threshold.
fn detect_episodes(
    samples: &[HistorySample],
    mean: [f64; DIMS],
    perturbation_threshold: f64,
    recovery_threshold: f64,
) -> Vec<Vec<HistorySample>> {
    let dist = |s: &HistorySample| {
        s.state
            .as_array()
            .iter()
            .zip(mean.iter())
            .map(|(x, m)| (x - m) * (x - m))
            .sum::<f64>()
            .sqrt()
    };

    let mut episodes = Vec::new();
    let mut current: Option<Vec<HistorySample>> = None;

    for s in samples {
        let d = dist(s);
        match current.as_mut() {
            None => {
                if d > perturbation_threshold {
                    current = Some(vec![*s]);
                }
            }
            Some(ep) => {
                ep.push(*s);
                if d < recovery_threshold {
                    episodes.push(current.take().unwrap_or_default());
                }
            }
        }
    }
    // A still-open episode at the end of the series is unfinished evidence
    // and is dropped.
    episodes
}

/// Log-linear fit of one dimension's decay within one episode.
///
/// With y(t) = (x(t) - mu)/(x0 - mu), the model says ln y = -t/tau, so a
/// least-squares slope through the origin gives tau directly. Points where
/// the dimension overshot the mean (y <= 0) carry no decay information and
/// are skipped.
fn fit_tau(episode: &[HistorySample], mu: f64, dim: usize, max_tau_secs: f64) -> Option<f64> {
    let first = episode.first()?;
    let x0 = first.state.as_array()[dim];
    let displacement = x0 - mu;
    if displacement.abs() < MIN_DISPLACEMENT {
        return None;
    }

    let t0 = first.at;
    let mut sum_t_lny = 0.0;
    let mut sum_t_sq = 0.0;
    let mut points = 0usize;

    for s in episode {
        let t = (s.at - t0).num_milliseconds() as f64 / 1000.0;
        if t <= 0.0 {
            continue;
        }
        let y = (s.state.as_array()[dim] - mu) / displacement;
        if y <= 1e-9 || y > 1.0 {
            continue;
        }
        sum_t_lny += t * y.ln();
        sum_t_sq += t * t;
        points += 1;
    }

    if points < MIN_FIT_POINTS || sum_t_sq <= 0.0 {
        return None;
    }
    let slope = sum_t_lny / sum_t_sq;
    if slope >= 0.0 {
        return None;
    }
    let tau = -1.0 / slope;
    if tau <= 0.0 || tau > max_tau_secs {
        return None;
    }
    Some(tau)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use hearth_core::InternalState;

    /// Build a series: quiet baseline, then `episodes` exponential
    /// recoveries in the warmth dimension with the given tau.
    fn decay_series(tau: f64, episodes: usize) -> Vec<HistorySample> {
        let mut out = Vec::new();
        let mut t = Utc::now();
        let step = Duration::seconds(5);
        let mu = 0.5;

        for _ in 0..episodes {
            // Baseline
            for _ in 0..5 {
                out.push(HistorySample {
                    at: t,
                    state: InternalState::new(mu, mu, mu, mu),
                });
                t += step;
            }
            // Perturb to 0.9 and decay back
            let mut elapsed = 0.0;
            loop {
                let x = mu + 0.4 * (-elapsed / tau).exp();
                out.push(HistorySample {
                    at: t,
                    state: InternalState::new(x, mu, mu, mu),
                });
                t += step;
                elapsed += 5.0;
                if (x - mu).abs() < 0.04 {
                    break;
                }
            }
        }
        // Trailing baseline so the last episode closes.
        for _ in 0..5 {
            out.push(HistorySample {
                at: t,
                state: InternalState::new(mu, mu, mu, mu),
            });
            t += step;
        }
        out
    }

    #[test]
    fn recovers_known_tau_within_tolerance() {
        let series = decay_series(45.0, 4);
        let profile =
            RecoveryProfile::estimate(&series, [0.5; 4], 0.15, 0.05, 3, 3600.0).unwrap();

        let tau = profile.tau_secs[0].expect("warmth tau should be present");
        assert!(
            (tau - 45.0).abs() / 45.0 < 0.2,
            "estimated tau {tau} not within 20% of 45s"
        );
        // The undisturbed dimensions have nothing to report.
        assert!(profile.tau_secs[1].is_none());
        assert!(profile.tau_secs[2].is_none());
        assert!(profile.tau_secs[3].is_none());
    }

    #[test]
    fn fewer_than_min_episodes_is_absent() {
        let series = decay_series(45.0, 2);
        assert!(RecoveryProfile::estimate(&series, [0.5; 4], 0.15, 0.05, 3, 3600.0).is_none());
    }

    #[test]
    fn quiet_series_has_no_episodes() {
        let series: Vec<HistorySample> = (0..100)
            .map(|i| HistorySample {
                at: Utc::now() + Duration::seconds(i * 5),
                state: InternalState::new(0.5, 0.5, 0.5, 0.5),
            })
            .collect();
        assert!(RecoveryProfile::estimate(&series, [0.5; 4], 0.15, 0.05, 3, 3600.0).is_none());
    }

    #[test]
    fn unfinished_episode_is_dropped() {
        // Perturb and never recover: distance stays above the recovery
        // threshold to the end of the series.
        let mut series = Vec::new();
        let mut t = Utc::now();
        for _ in 0..10 {
            series.push(HistorySample {
                at: t,
                state: InternalState::new(0.5, 0.5, 0.5, 0.5),
            });
            t += Duration::seconds(5);
        }
        for _ in 0..50 {
            series.push(HistorySample {
                at: t,
                state: InternalState::new(0.9, 0.5, 0.5, 0.5),
            });
            t += Duration::seconds(5);
        }
        assert!(RecoveryProfile::estimate(&series, [0.5; 4], 0.15, 0.05, 1, 3600.0).is_none());
    }

    #[test]
    fn implausibly_slow_decay_is_discarded() {
        // tau of 10000s exceeds the 3600s sanity bound; the fit succeeds
        // numerically but must be rejected.
        let series = decay_series(10_000.0, 4);
        let result = RecoveryProfile::estimate(&series, [0.5; 4], 0.15, 0.05, 3, 3600.0);
        if let Some(profile) = result {
            assert!(profile.tau_secs[0].is_none());
        }
    }
}
