//! Error types for Hearth

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("store write failed: {0}")]
    StoreWrite(String),

    #[error("store read failed: {0}")]
    StoreRead(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("store operation timed out after {0}ms")]
    StoreTimeout(u64),

    #[error("sensor bus error: {0}")]
    SensorBus(String),

    #[error("identity store error: {0}")]
    IdentityStore(String),

    #[error("governance call failed: {0}")]
    Governance(String),

    #[error("governance call timed out")]
    GovernanceTimeout,

    #[error("insufficient history: need {needed} samples, have {have}")]
    InsufficientHistory { needed: usize, have: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn store_write(msg: impl Into<String>) -> Self {
        Self::StoreWrite(msg.into())
    }

    pub fn store_read(msg: impl Into<String>) -> Self {
        Self::StoreRead(msg.into())
    }

    pub fn governance(msg: impl Into<String>) -> Self {
        Self::Governance(msg.into())
    }
}
