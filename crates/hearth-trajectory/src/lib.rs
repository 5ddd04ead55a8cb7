//! Trajectory engine — behavioral identity from state history
//!
//! The agent's identity is not a key, it is a shape: the statistical home
//! region its internal state orbits (attractor basin), how fast it returns
//! there after being pushed out (recovery profile), and the slower-moving
//! preference, belief, and relational summaries. This crate computes that
//! composite fingerprint, compares fingerprints, and watches the live one
//! for sudden corruption (anomaly) versus slow maturation (drift).

pub mod basin;
pub mod continuity;
pub mod recovery;
pub mod signature;

pub use basin::AttractorBasin;
pub use continuity::{
    load_or_seal_genesis, ContinuityMonitor, ContinuityReport, ContinuityVerdict, GenesisRecord,
};
pub use recovery::RecoveryProfile;
pub use signature::{
    AdaptiveWeights, RelationalStats, SimilarityReport, TrajectorySignature,
};
