//! The governance bridge: remote decision service with local fallback
//!
//! Every call produces a decision. The remote path runs under a hard
//! timeout behind the circuit breaker; anything that keeps it from
//! answering routes to a small local threshold rule set instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hearth_core::config::GovernanceConfig;
use hearth_core::{DecisionSource, Error, GovernanceDecision, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::breaker::CircuitBreaker;
use crate::metrics::MetricVector;

/// What the remote service answers with. The bridge stamps the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub action: String,
    pub margin: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
struct DecisionRequest<'a> {
    metrics: &'a MetricVector,
    status: &'a str,
}

/// Seam for the remote decision endpoint, so tests can script outcomes
/// without a network.
#[async_trait]
pub trait DecisionService: Send + Sync {
    async fn decide(&self, metrics: &MetricVector, status: &str) -> Result<DecisionResponse>;
}

/// HTTP POST to the configured endpoint with a JSON body of
/// `{metrics, status}`.
pub struct HttpDecisionService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDecisionService {
    pub fn new(cfg: &GovernanceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs_f64(cfg.timeout_secs))
            .build()
            .map_err(|e| Error::governance(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
        })
    }
}

#[async_trait]
impl DecisionService for HttpDecisionService {
    async fn decide(&self, metrics: &MetricVector, status: &str) -> Result<DecisionResponse> {
        let body = DecisionRequest { metrics, status };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::GovernanceTimeout
                } else {
                    Error::governance(e.to_string())
                }
            })?;
        if !resp.status().is_success() {
            return Err(Error::governance(format!(
                "endpoint returned {}",
                resp.status()
            )));
        }
        resp.json::<DecisionResponse>()
            .await
            .map_err(|e| Error::governance(format!("malformed response: {e}")))
    }
}

/// Owns the breaker and the fallback rules. `decide` never fails: the
/// caller always gets a decision, remote or local.
pub struct GovernanceBridge {
    service: Option<Box<dyn DecisionService>>,
    breaker: CircuitBreaker,
    cfg: GovernanceConfig,
}

impl GovernanceBridge {
    pub fn new(cfg: GovernanceConfig) -> Result<Self> {
        let service: Option<Box<dyn DecisionService>> = if cfg.endpoint.is_empty() {
            None
        } else {
            Some(Box::new(HttpDecisionService::new(&cfg)?))
        };
        Ok(Self {
            breaker: CircuitBreaker::new(cfg.failure_threshold, cfg.cooldown_secs),
            service,
            cfg,
        })
    }

    /// Swap the remote service, e.g. for a scripted one in tests.
    pub fn with_service(cfg: GovernanceConfig, service: Box<dyn DecisionService>) -> Self {
        Self {
            breaker: CircuitBreaker::new(cfg.failure_threshold, cfg.cooldown_secs),
            service: Some(service),
            cfg,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn decide(
        &mut self,
        now: DateTime<Utc>,
        metrics: &MetricVector,
        status: &str,
    ) -> GovernanceDecision {
        let remote_allowed = self.service.is_some() && self.breaker.try_acquire(now);
        if remote_allowed {
            // try_acquire only returns true when service is Some
            if let Some(service) = &self.service {
                match service.decide(metrics, status).await {
                    Ok(resp) => {
                        self.breaker.record_success();
                        debug!(action = %resp.action, "remote governance decision");
                        return GovernanceDecision {
                            action: resp.action,
                            margin: resp.margin,
                            reason: resp.reason,
                            source: DecisionSource::Remote,
                        };
                    }
                    Err(e) => {
                        warn!(error = %e, "remote governance call failed, using fallback");
                        self.breaker.record_failure(now);
                    }
                }
            }
        }
        self.fallback(metrics)
    }

    /// Local threshold rules. Conservative: anything alarming recommends
    /// a pause, otherwise proceed with a margin reflecting how close the
    /// metrics sit to the pause thresholds.
    fn fallback(&self, metrics: &MetricVector) -> GovernanceDecision {
        let imbalance = metrics.affect_imbalance().abs();
        if metrics.entropy > self.cfg.entropy_pause_threshold {
            return GovernanceDecision {
                action: "pause".into(),
                margin: "narrow".into(),
                reason: format!(
                    "entropy {:.2} above {:.2}",
                    metrics.entropy, self.cfg.entropy_pause_threshold
                ),
                source: DecisionSource::Fallback,
            };
        }
        if imbalance > self.cfg.imbalance_pause_threshold {
            return GovernanceDecision {
                action: "pause".into(),
                margin: "narrow".into(),
                reason: format!(
                    "affect imbalance {:.2} above {:.2}",
                    imbalance, self.cfg.imbalance_pause_threshold
                ),
                source: DecisionSource::Fallback,
            };
        }
        let entropy_room = self.cfg.entropy_pause_threshold - metrics.entropy;
        let imbalance_room = self.cfg.imbalance_pause_threshold - imbalance;
        let margin = if entropy_room.min(imbalance_room) < 0.15 {
            "narrow"
        } else {
            "wide"
        };
        GovernanceDecision {
            action: "proceed".into(),
            margin: margin.into(),
            reason: "local thresholds nominal".into(),
            source: DecisionSource::Fallback,
        }
    }
}
