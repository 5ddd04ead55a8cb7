//! Shared types for Hearth
//!
//! Everything both processes agree on lives here: the sensor reading and
//! internal-state model, the snapshot schema (the only contract between
//! broker and interface), the sensor adapter seam, and configuration.

pub mod config;
pub mod error;
pub mod sense;
pub mod types;

pub use config::HearthConfig;
pub use error::{Error, Result};
pub use sense::SensorAdapter;
pub use types::{
    DecisionSource, GovernanceDecision, HistorySample, Identity, InternalState, Reading, Snapshot,
};
