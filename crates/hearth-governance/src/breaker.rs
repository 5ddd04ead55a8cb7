//! Circuit breaker for the remote decision service
//!
//! Closed: calls flow; consecutive failures count up. Open: calls are
//! skipped until the cooldown elapses. HalfOpen: exactly one probe goes
//! through, and its outcome decides which way the breaker snaps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<DateTime<Utc>>,
    failure_threshold: u32,
    cooldown_secs: f64,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown_secs: f64) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            failure_threshold: failure_threshold.max(1),
            cooldown_secs,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// May a remote call be attempted right now? Open transitions to
    /// HalfOpen when the cooldown has elapsed — and HalfOpen admits only
    /// the caller that performed that transition; everyone else waits for
    /// the probe's outcome.
    pub fn try_acquire(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => false,
            BreakerState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|t| (now - t).num_milliseconds() as f64 / 1000.0)
                    .unwrap_or(f64::MAX);
                if elapsed >= self.cooldown_secs {
                    info!("circuit breaker half-open, probing");
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        match self.state {
            BreakerState::HalfOpen => {
                info!("circuit breaker closed after successful probe");
                self.state = BreakerState::Closed;
                self.consecutive_failures = 0;
                self.opened_at = None;
            }
            BreakerState::Closed => {
                self.consecutive_failures = 0;
            }
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        match self.state {
            BreakerState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.failure_threshold {
                    warn!(
                        failures = self.consecutive_failures,
                        "circuit breaker opened"
                    );
                    self.state = BreakerState::Open;
                    self.opened_at = Some(now);
                }
            }
            BreakerState::HalfOpen => {
                // Probe failed: back to Open with a fresh cooldown.
                warn!("circuit breaker probe failed, reopening");
                self.state = BreakerState::Open;
                self.opened_at = Some(now);
            }
            BreakerState::Open => {}
        }
    }
}
