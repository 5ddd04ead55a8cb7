//! Hearth — a persistent embodied agent split across two processes
//!
//! The broker (owner) holds exclusive access to the sensor bus: it reads,
//! derives the felt state, maintains history and the trajectory identity,
//! consults governance, and publishes an atomic snapshot every tick. The
//! interface (consumer) is stateless-restartable: it perceives through
//! the freshest snapshot and only falls back to direct sensing when the
//! broker is demonstrably gone.

pub mod consumer;
pub mod identity;
pub mod owner;

pub use consumer::{BrokerLiveness, Interface, Perception, PerceptionSource};
pub use owner::{Broker, BrokerPhase};
