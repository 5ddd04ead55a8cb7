//! Integration tests for hearth-trajectory
//!
//! Signature similarity laws (reflexivity, symmetry, weight
//! redistribution), the two-tier anomaly/drift distinction, cold-start
//! suppression, and genesis write-once semantics.

use chrono::{Duration, Utc};
use hearth_core::config::{SignatureWeights, TrajectoryConfig};
use hearth_core::{HistorySample, InternalState};
use hearth_trajectory::continuity::load_or_seal_genesis;
use hearth_trajectory::{
    ContinuityMonitor, ContinuityVerdict, RelationalStats, TrajectorySignature,
};
use tempfile::TempDir;

fn cfg() -> TrajectoryConfig {
    TrajectoryConfig::default()
}

/// A lively but self-consistent history: orbiting a fixed set-point with
/// occasional perturbation-recovery excursions so every signature
/// component materializes.
fn rich_history(n: usize, center: f64, seed: f64) -> Vec<HistorySample> {
    let mut out = Vec::with_capacity(n);
    let t0 = Utc::now() - Duration::seconds((n as i64) * 5);
    for i in 0..n {
        let t = i as f64;
        let excursion = if i % 120 < 25 {
            // decay from a kick, tau ~= 40s with 5s sampling
            0.25 * (-(t % 120.0) * 5.0 / 40.0).exp()
        } else {
            0.0
        };
        let state = InternalState::new(
            center + excursion + 0.01 * (t / 7.0 + seed).sin(),
            center + 0.01 * (t / 11.0 + seed).cos(),
            center + 0.01 * (t / 13.0 + seed).sin(),
            center + 0.01 * (t / 17.0 + seed).cos(),
        );
        out.push(HistorySample {
            at: t0 + Duration::seconds(i as i64 * 5),
            state,
        });
    }
    out
}

fn full_signature(center: f64, seed: f64) -> TrajectorySignature {
    TrajectorySignature::compute(
        &rich_history(600, center, seed),
        Some(vec![0.8, 0.1, 0.4, 0.9]),
        Some(vec![0.5, 0.5, 0.2]),
        Some(RelationalStats {
            interactions: 40,
            valence_tendency: 0.3,
            familiarity: 0.7,
        }),
        &cfg(),
    )
}

// ============================================================
// Similarity laws
// ============================================================

#[test]
fn similarity_is_reflexive() {
    let sig = full_signature(0.5, 0.0);
    let report = sig.similarity(&sig, &SignatureWeights::default());
    let overall = report.overall.unwrap();
    assert!(overall > 0.99, "self-similarity was {overall}");
}

#[test]
fn similarity_is_symmetric() {
    let a = full_signature(0.5, 0.0);
    let b = full_signature(0.6, 3.0);
    let w = SignatureWeights::default();
    let ab = a.similarity(&b, &w).overall.unwrap();
    let ba = b.similarity(&a, &w).overall.unwrap();
    assert!((ab - ba).abs() < 1e-9, "{ab} != {ba}");
}

#[test]
fn different_agents_score_below_self() {
    let a = full_signature(0.45, 0.0);
    let b = full_signature(0.7, 9.0);
    let w = SignatureWeights::default();
    let cross = a.similarity(&b, &w).overall.unwrap();
    let own = a.similarity(&a, &w).overall.unwrap();
    assert!(cross < own);
}

#[test]
fn absent_components_redistribute_weight() {
    // A signature with only an equilibrium: the homeostatic component
    // carries all the weight, and a perfect match scores ~1.0 rather than
    // being dragged to 0.15 by five "zero" components.
    let bare = TrajectorySignature {
        preferences: None,
        beliefs: None,
        basin: None,
        recovery: None,
        relational: None,
        equilibrium: Some([0.5; 4]),
        observation_count: 10,
        computed_at: Utc::now(),
    };
    let report = bare.similarity(&bare, &SignatureWeights::default());
    assert!((report.overall.unwrap() - 1.0).abs() < 1e-9);
    assert_eq!(report.components.iter().filter(|c| c.is_some()).count(), 1);
}

#[test]
fn fully_absent_comparison_has_no_overall() {
    let empty = TrajectorySignature {
        preferences: None,
        beliefs: None,
        basin: None,
        recovery: None,
        relational: None,
        equilibrium: None,
        observation_count: 0,
        computed_at: Utc::now(),
    };
    assert!(empty
        .similarity(&empty, &SignatureWeights::default())
        .overall
        .is_none());
}

// ============================================================
// Signature computation
// ============================================================

#[test]
fn cold_start_yields_partial_signature() {
    let sig = TrajectorySignature::compute(&rich_history(10, 0.5, 0.0), None, None, None, &cfg());
    assert!(sig.basin.is_none(), "10 samples is below the basin floor");
    assert!(sig.recovery.is_none());
    assert!(sig.equilibrium.is_some());
    assert!(sig.confidence(50) < 0.25);
}

#[test]
fn confidence_saturates_at_floor() {
    let sig = full_signature(0.5, 0.0);
    assert!((sig.confidence(50) - 1.0).abs() < 1e-12);
    let young = TrajectorySignature::compute(&rich_history(25, 0.5, 0.0), None, None, None, &cfg());
    assert!((young.confidence(50) - 0.5).abs() < 1e-12);
}

#[test]
fn rich_history_materializes_every_component() {
    let sig = full_signature(0.5, 0.0);
    assert!(sig.basin.is_some());
    assert!(sig.recovery.is_some(), "excursions should yield a recovery profile");
    assert!(sig.recovery.as_ref().unwrap().any_tau());
    assert!(sig.equilibrium.is_some());
}

// ============================================================
// Continuity: anomaly vs drift
// ============================================================

#[test]
fn stable_agent_stays_stable() {
    let mut monitor = ContinuityMonitor::new(cfg());
    monitor.set_genesis(full_signature(0.5, 0.0));

    let mut now = Utc::now();
    let mut verdicts = Vec::new();
    for i in 0..4 {
        let sig = full_signature(0.5, i as f64 * 0.1);
        verdicts.push(monitor.assess(now, &sig).verdict);
        now += Duration::seconds(700); // past the coherence lag
    }
    assert!(verdicts.iter().all(|v| *v == ContinuityVerdict::Stable), "{verdicts:?}");
}

#[test]
fn sudden_replacement_flags_anomaly() {
    let mut monitor = ContinuityMonitor::new(cfg());
    monitor.set_genesis(full_signature(0.5, 0.0));

    let mut now = Utc::now();
    monitor.assess(now, &full_signature(0.5, 0.0));
    now += Duration::seconds(700);
    monitor.assess(now, &full_signature(0.5, 0.1));
    now += Duration::seconds(700);

    // A completely different agent: different set-point, opposite
    // preferences and valence.
    let imposter = TrajectorySignature::compute(
        &rich_history(600, 0.15, 50.0),
        Some(vec![-0.8, -0.1, -0.4, -0.9]),
        Some(vec![-0.5, -0.5, -0.2]),
        Some(RelationalStats {
            interactions: 2,
            valence_tendency: -0.9,
            familiarity: 0.0,
        }),
        &cfg(),
    );
    let report = monitor.assess(now, &imposter);
    assert_eq!(report.verdict, ContinuityVerdict::Anomaly, "{report:?}");
    assert!(report.coherence.unwrap() < 0.70);
}

#[test]
fn gradual_departure_flags_drift_not_anomaly() {
    let mut c = cfg();
    // Tighten the drift threshold so the slow walk below trips lineage
    // while successive steps stay coherent.
    c.drift_threshold = 0.97;
    c.anomaly_threshold = 0.70;
    let mut monitor = ContinuityMonitor::new(c);
    monitor.set_genesis(full_signature(0.40, 0.0));

    let mut now = Utc::now();
    let mut last = ContinuityVerdict::Stable;
    for step in 0..10 {
        // Set-point creeps 0.01 per step: adjacent steps nearly
        // identical, endpoints far apart.
        let sig = full_signature(0.40 + step as f64 * 0.01, 0.0);
        last = monitor.assess(now, &sig).verdict;
        assert_ne!(last, ContinuityVerdict::Anomaly, "step {step} looked sudden");
        now += Duration::seconds(700);
    }
    assert_eq!(last, ContinuityVerdict::Drift);
}

#[test]
fn immature_signature_suppresses_alerts() {
    let mut monitor = ContinuityMonitor::new(cfg());
    monitor.set_genesis(full_signature(0.5, 0.0));

    // 20 observations: far from the imposter's genesis, but too young to
    // accuse.
    let young = TrajectorySignature::compute(&rich_history(20, 0.9, 7.0), None, None, None, &cfg());
    let report = monitor.assess(Utc::now(), &young);
    assert_eq!(report.verdict, ContinuityVerdict::Immature);
    assert!(report.confidence < 1.0);
}

// ============================================================
// Genesis: sealed once, never recomputed
// ============================================================

#[test]
fn genesis_seals_once_and_sticks() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("genesis.json");

    let first = full_signature(0.5, 0.0);
    let sealed = load_or_seal_genesis(&path, &first).unwrap();
    assert_eq!(sealed.signature.observation_count, first.observation_count);

    // A later candidate must NOT replace the anchor.
    let later = full_signature(0.9, 42.0);
    let reloaded = load_or_seal_genesis(&path, &later).unwrap();
    assert_eq!(reloaded.sealed_at, sealed.sealed_at);
    assert_eq!(
        reloaded.signature.equilibrium,
        sealed.signature.equilibrium
    );
}

#[test]
fn corrupt_genesis_is_an_error_not_a_reseal() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("genesis.json");
    std::fs::write(&path, "definitely not json").unwrap();

    let result = load_or_seal_genesis(&path, &full_signature(0.5, 0.0));
    assert!(result.is_err(), "corrupt anchor must not be silently replaced");
}
