//! Decision types, trust gating, and running metrics.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{MarketRegime, ModelForecast, ModelId};

/// Outcome tier for one gated forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Caution,
    Reject,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Accept => write!(f, "accept"),
            Decision::Caution => write!(f, "caution"),
            Decision::Reject => write!(f, "reject"),
        }
    }
}

/// Stages of one forecast request, in pipeline order. Terminal per request:
/// every stage runs to completion once a request begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    DataEnriched,
    RegimeDetected,
    EnsembleScored,
    TrustGated,
}

impl std::fmt::Display for RequestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStage::DataEnriched => write!(f, "data_enriched"),
            RequestStage::RegimeDetected => write!(f, "regime_detected"),
            RequestStage::EnsembleScored => write!(f, "ensemble_scored"),
            RequestStage::TrustGated => write!(f, "trust_gated"),
        }
    }
}

/// Map a trust score to a decision tier. The accept boundary is inclusive.
pub fn gate(trust_score: f64, accept_threshold: f64, min_confidence: f64) -> Decision {
    if trust_score >= accept_threshold {
        Decision::Accept
    } else if trust_score >= min_confidence {
        Decision::Caution
    } else {
        Decision::Reject
    }
}

/// Downgrade a decision exactly one tier; reject stays reject.
pub fn downgrade(decision: Decision) -> Decision {
    match decision {
        Decision::Accept => Decision::Caution,
        Decision::Caution | Decision::Reject => Decision::Reject,
    }
}

/// Human-readable recommendation keyed off the final decision tier.
pub fn recommendation(decision: Decision, confidence: f64, uncertainty: f64) -> String {
    match decision {
        Decision::Accept => format!(
            "High confidence prediction (confidence: {confidence:.2}). Recommended for use."
        ),
        Decision::Caution => format!(
            "Moderate confidence prediction (confidence: {confidence:.2}, uncertainty: {uncertainty:.2}). Use with caution."
        ),
        Decision::Reject => {
            "Low confidence prediction. Not recommended for use. Consider waiting for more data."
                .to_string()
        }
    }
}

/// Full result of one coordinated forecast request. Created once per
/// request; immutable once returned.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorDecision {
    pub id: Uuid,
    pub symbol: String,
    pub prediction: f64,
    /// Final confidence after the regime boost, in [0, 1].
    pub confidence: f64,
    pub base_confidence: f64,
    pub confidence_adjustment: f64,
    pub interval: (f64, f64),
    pub uncertainty: f64,
    pub data_quality: f64,
    pub regime: MarketRegime,
    /// Normalized learner weights used for this request.
    pub weights: HashMap<ModelId, f64>,
    pub per_model: Vec<ModelForecast>,
    pub trust_score: f64,
    pub decision: Decision,
    pub recommendation: String,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Compact history entry kept in the bounded decision ring buffer. Carries
/// the regime and the model ids used so feedback can close the loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub prediction: f64,
    pub confidence: f64,
    pub trust_score: f64,
    pub decision: Decision,
    pub regime: MarketRegime,
    pub models_used: Vec<ModelId>,
    pub recommendation: String,
}

impl From<&CoordinatorDecision> for DecisionRecord {
    fn from(result: &CoordinatorDecision) -> Self {
        Self {
            timestamp: result.timestamp,
            symbol: result.symbol.clone(),
            prediction: result.prediction,
            confidence: result.confidence,
            trust_score: result.trust_score,
            decision: result.decision,
            regime: result.regime,
            models_used: result.per_model.iter().map(|m| m.model_id).collect(),
            recommendation: result.recommendation.clone(),
        }
    }
}

/// Running counters across all requests served by one coordinator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoordinatorMetrics {
    pub total_predictions: u64,
    /// Requests that gated to accept.
    pub accepted_predictions: u64,
    /// Requests that gated to accept or caution.
    pub validated_predictions: u64,
    /// Incremental mean of final confidence across all requests.
    pub average_confidence: f64,
}

impl CoordinatorMetrics {
    pub fn record(&mut self, decision: Decision, confidence: f64) {
        self.total_predictions += 1;
        if decision == Decision::Accept {
            self.accepted_predictions += 1;
        }
        if decision != Decision::Reject {
            self.validated_predictions += 1;
        }
        let n = self.total_predictions as f64;
        self.average_confidence = (self.average_confidence * (n - 1.0) + confidence) / n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_boundary_is_inclusive() {
        assert_eq!(gate(0.75, 0.75, 0.6), Decision::Accept);
        assert_eq!(gate(0.749, 0.75, 0.6), Decision::Caution);
    }

    #[test]
    fn test_below_min_confidence_rejects() {
        assert_eq!(gate(0.6, 0.75, 0.6), Decision::Caution);
        assert_eq!(gate(0.599, 0.75, 0.6), Decision::Reject);
    }

    #[test]
    fn test_downgrade_one_tier() {
        assert_eq!(downgrade(Decision::Accept), Decision::Caution);
        assert_eq!(downgrade(Decision::Caution), Decision::Reject);
        assert_eq!(downgrade(Decision::Reject), Decision::Reject);
    }

    #[test]
    fn test_metrics_incremental_mean() {
        let mut metrics = CoordinatorMetrics::default();
        metrics.record(Decision::Accept, 0.8);
        metrics.record(Decision::Caution, 0.6);
        metrics.record(Decision::Reject, 0.4);

        assert_eq!(metrics.total_predictions, 3);
        assert_eq!(metrics.accepted_predictions, 1);
        assert_eq!(metrics.validated_predictions, 2);
        assert!((metrics.average_confidence - 0.6).abs() < 1e-9);
    }
}
