//! Online weight learning and per-regime strategy adaptation.
//!
//! Learns per-model trust weights from realized forecast errors
//! (exponentially smoothed, never hard-replaced) and nudges a per-regime
//! confidence boost up or down from observed outcomes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LearningConfig;
use crate::domain::{mean, MarketRegime, ModelId, RingBuffer};

/// Bounds for the per-regime confidence boost.
const CONFIDENCE_BOOST_MIN: f64 = -0.2;
const CONFIDENCE_BOOST_MAX: f64 = 0.2;

/// Relative error below which a regime strategy is rewarded.
const GOOD_PREDICTION_ERROR: f64 = 0.05;
/// Relative error above which a regime strategy is penalized.
const POOR_PREDICTION_ERROR: f64 = 0.15;
/// Step applied to the confidence boost per observation.
const BOOST_STEP: f64 = 0.01;

/// Per-model error history and smoothed weight.
#[derive(Debug, Clone)]
pub struct ModelPerformanceRecord {
    pub recent_errors: RingBuffer<f64>,
    pub weight: f64,
}

/// Strategy parameters for one market regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeStrategy {
    /// Model hint for this regime; `None` means use the full ensemble.
    pub preferred_model: Option<ModelId>,
    /// Additive confidence adjustment, bounded to [-0.2, 0.2].
    pub confidence_boost: f64,
}

/// Serializable snapshot of the weight and strategy tables, persisted across
/// process restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningState {
    pub models: HashMap<ModelId, PersistedModelRecord>,
    pub strategies: HashMap<MarketRegime, RegimeStrategy>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedModelRecord {
    pub weight: f64,
    /// Only the errors feeding the weight average are persisted.
    pub recent_errors: Vec<f64>,
}

/// Per-model entry in the learning report.
#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub weight: f64,
    pub average_error: f64,
    pub samples: usize,
}

/// Aggregated view of the learner for the performance report.
#[derive(Debug, Clone, Serialize)]
pub struct LearningReport {
    pub models: HashMap<ModelId, ModelReport>,
    pub strategies: HashMap<MarketRegime, RegimeStrategy>,
}

/// Maintains per-model performance weights and per-regime strategy
/// parameters, updated online from realized errors.
#[derive(Debug, Clone)]
pub struct AdaptiveWeightLearner {
    learning_rate: f64,
    error_history_cap: usize,
    recent_window: usize,
    models: HashMap<ModelId, ModelPerformanceRecord>,
    strategies: HashMap<MarketRegime, RegimeStrategy>,
}

impl AdaptiveWeightLearner {
    pub fn new(config: &LearningConfig, model_ids: &[ModelId]) -> Self {
        let models = model_ids
            .iter()
            .map(|id| {
                (
                    *id,
                    ModelPerformanceRecord {
                        recent_errors: RingBuffer::new(config.error_history_cap),
                        weight: 1.0,
                    },
                )
            })
            .collect();

        Self {
            learning_rate: config.learning_rate,
            error_history_cap: config.error_history_cap,
            recent_window: config.recent_error_window,
            models,
            strategies: default_strategies(),
        }
    }

    /// Record one realized error for a model and smooth its weight toward
    /// `1 / (1 + mean(recent errors))`. Skipped when the actual value is
    /// zero (relative error undefined) or the model is not registered.
    pub fn record_error(&mut self, model: ModelId, predicted: f64, actual: f64) {
        if actual == 0.0 {
            return;
        }
        let Some(record) = self.models.get_mut(&model) else {
            return;
        };

        let error = ((actual - predicted) / actual).abs();
        record.recent_errors.push(error);

        let recent: Vec<f64> = record.recent_errors.tail(self.recent_window).copied().collect();
        let avg_error = mean(&recent);
        let candidate = 1.0 / (1.0 + avg_error);

        record.weight =
            (self.learning_rate * candidate + (1.0 - self.learning_rate) * record.weight).max(0.0);

        debug!(
            model = %model,
            error,
            avg_error,
            weight = record.weight,
            "model weight updated"
        );
    }

    /// All model weights normalized to sum to 1; uniform when every weight
    /// is zero.
    pub fn weights_snapshot(&self) -> HashMap<ModelId, f64> {
        let total: f64 = self.models.values().map(|r| r.weight).sum();
        if total > 0.0 {
            self.models
                .iter()
                .map(|(id, r)| (*id, r.weight / total))
                .collect()
        } else {
            let uniform = 1.0 / self.models.len().max(1) as f64;
            self.models.keys().map(|id| (*id, uniform)).collect()
        }
    }

    /// Strategy for a regime; falls back to the live sideways strategy,
    /// learned boost included, when the table has no entry.
    pub fn strategy_for(&self, regime: MarketRegime) -> RegimeStrategy {
        self.strategies
            .get(&regime)
            .or_else(|| self.strategies.get(&MarketRegime::Sideways))
            .cloned()
            .unwrap_or(RegimeStrategy {
                preferred_model: None,
                confidence_boost: 0.0,
            })
    }

    /// Nudge a regime's confidence boost from one observed outcome: small
    /// errors reward it, large errors penalize it, clamped to [-0.2, 0.2].
    pub fn update_regime_strategy(&mut self, regime: MarketRegime, predicted: f64, actual: f64) {
        if actual == 0.0 {
            return;
        }
        let Some(strategy) = self.strategies.get_mut(&regime) else {
            return;
        };

        let error = ((actual - predicted) / actual).abs();
        if error < GOOD_PREDICTION_ERROR {
            strategy.confidence_boost += BOOST_STEP;
        } else if error > POOR_PREDICTION_ERROR {
            strategy.confidence_boost -= BOOST_STEP;
        }
        strategy.confidence_boost = strategy
            .confidence_boost
            .clamp(CONFIDENCE_BOOST_MIN, CONFIDENCE_BOOST_MAX);

        debug!(
            %regime,
            error,
            confidence_boost = strategy.confidence_boost,
            "regime strategy updated"
        );
    }

    /// Snapshot the weight and strategy tables for persistence.
    pub fn to_state(&self) -> LearningState {
        let models = self
            .models
            .iter()
            .map(|(id, record)| {
                (
                    *id,
                    PersistedModelRecord {
                        weight: record.weight,
                        recent_errors: record
                            .recent_errors
                            .tail(self.recent_window)
                            .copied()
                            .collect(),
                    },
                )
            })
            .collect();

        LearningState {
            models,
            strategies: self.strategies.clone(),
            saved_at: Utc::now(),
        }
    }

    /// Restore a persisted snapshot. Entries for unregistered models are
    /// ignored; restored boosts are re-clamped.
    pub fn apply_state(&mut self, state: LearningState) {
        for (model, persisted) in state.models {
            if let Some(record) = self.models.get_mut(&model) {
                record.weight = persisted.weight.max(0.0);
                record.recent_errors = RingBuffer::new(self.error_history_cap);
                record.recent_errors.extend(persisted.recent_errors);
            }
        }
        for (regime, mut strategy) in state.strategies {
            strategy.confidence_boost = strategy
                .confidence_boost
                .clamp(CONFIDENCE_BOOST_MIN, CONFIDENCE_BOOST_MAX);
            self.strategies.insert(regime, strategy);
        }
    }

    /// Per-model weight, average error, and sample count plus the strategy
    /// table.
    pub fn report(&self) -> LearningReport {
        let models = self
            .models
            .iter()
            .map(|(id, record)| {
                let errors: Vec<f64> = record.recent_errors.iter().copied().collect();
                (
                    *id,
                    ModelReport {
                        weight: record.weight,
                        average_error: mean(&errors),
                        samples: errors.len(),
                    },
                )
            })
            .collect();

        LearningReport {
            models,
            strategies: self.strategies.clone(),
        }
    }
}

fn default_strategies() -> HashMap<MarketRegime, RegimeStrategy> {
    HashMap::from([
        (
            MarketRegime::Bull,
            RegimeStrategy {
                preferred_model: Some(ModelId::Transformer),
                confidence_boost: 0.1,
            },
        ),
        (
            MarketRegime::Bear,
            RegimeStrategy {
                preferred_model: Some(ModelId::Lstm),
                confidence_boost: 0.05,
            },
        ),
        (
            MarketRegime::Sideways,
            RegimeStrategy {
                preferred_model: None,
                confidence_boost: 0.0,
            },
        ),
        (
            MarketRegime::Volatile,
            RegimeStrategy {
                preferred_model: None,
                confidence_boost: -0.1,
            },
        ),
    ])
}
