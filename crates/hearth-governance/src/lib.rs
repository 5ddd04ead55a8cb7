//! Governance bridge — remote oversight with a local safety net
//!
//! The internal state maps to a fixed 4-metric vector, which a remote
//! decision service turns into {action, margin, reason}. The remote side
//! may be slow, down, or gone; a circuit breaker keeps a failing endpoint
//! from being hammered, and a local threshold rule set answers whenever
//! the remote cannot. The caller always gets a decision.

pub mod breaker;
pub mod bridge;
pub mod metrics;

pub use breaker::{BreakerState, CircuitBreaker};
pub use bridge::{DecisionService, GovernanceBridge, HttpDecisionService};
pub use metrics::MetricVector;
