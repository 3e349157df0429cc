//! PredictionCoordinator — orchestration and decision gate.
//!
//! Runs one request through enrichment, regime detection, adaptive
//! weighting, ensemble scoring, and the trust gate, then closes the
//! learning loop through `feedback`. All shared mutable state (learner,
//! tracker, history, metrics, persistence writes) lives behind one
//! coordinator-wide mutex; weight/strategy reads inside a request are a
//! point-in-time copy taken under that lock.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agents::{
    detect_regime, AdaptiveWeightLearner, DataQualityAssessor, EnsembleCombiner, LearningReport,
    PerformanceTracker,
};
use crate::config::CoordinatorConfig;
use crate::coordinator::decision::{
    downgrade, gate, recommendation, CoordinatorDecision, CoordinatorMetrics, DecisionRecord,
    RequestStage,
};
use crate::domain::{ModelId, RingBuffer};
use crate::error::{AugurError, Result};
use crate::persistence::JsonFileStore;
use crate::platform::{BackendRegistry, DataProvider, LearningStateStore};

/// Relative error above which feedback logs a retraining signal. Retraining
/// itself stays an external responsibility.
const RETRAIN_SIGNAL_ERROR: f64 = 0.10;

/// Confidence floor for the optional sanity validation step.
const VALIDATION_CONFIDENCE_FLOOR: f64 = 0.5;

/// Aggregated metrics and learner report for the caller-facing API.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub metrics: CoordinatorMetrics,
    pub ensemble_accuracy: f64,
    pub ensemble_predictions_made: u64,
    pub learning: LearningReport,
    pub recent_decisions: Vec<DecisionRecord>,
    /// True when learning-state persistence last failed and the coordinator
    /// is running on in-memory state only.
    pub degraded: bool,
}

/// State mutated by concurrent `predict`/`feedback` callers.
struct CoordinatorShared {
    learner: AdaptiveWeightLearner,
    ensemble_tracker: PerformanceTracker,
    history: RingBuffer<DecisionRecord>,
    metrics: CoordinatorMetrics,
    feedback_count: u64,
    min_confidence: f64,
    degraded: bool,
}

/// Orchestrates the agent pipeline into one request/response cycle and
/// gates each forecast through a trust score before release.
pub struct PredictionCoordinator {
    config: CoordinatorConfig,
    provider: Arc<dyn DataProvider>,
    backends: BackendRegistry,
    store: Arc<dyn LearningStateStore>,
    combiner: EnsembleCombiner,
    quality: DataQualityAssessor,
    shared: Mutex<CoordinatorShared>,
}

impl PredictionCoordinator {
    /// Construct a coordinator, restoring persisted learning state when
    /// available. Load failures are logged and leave the learner on
    /// defaults; they never fail construction.
    pub async fn new(
        config: CoordinatorConfig,
        provider: Arc<dyn DataProvider>,
        backends: BackendRegistry,
        store: Arc<dyn LearningStateStore>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|errors| AugurError::Validation(errors.join("; ")))?;
        if backends.is_empty() {
            return Err(AugurError::Validation(
                "at least one forecast backend must be registered".to_string(),
            ));
        }

        let model_ids: Vec<ModelId> = backends.keys().copied().collect();
        let mut learner = AdaptiveWeightLearner::new(&config.learning, &model_ids);

        let mut degraded = false;
        match store.load().await {
            Ok(Some(state)) => {
                learner.apply_state(state);
                info!("learning state restored from store");
            }
            Ok(None) => {
                debug!("no persisted learning state, starting with defaults");
            }
            Err(e) => {
                warn!(error = %e, "failed to load learning state, continuing with defaults");
                degraded = true;
            }
        }

        let shared = CoordinatorShared {
            learner,
            ensemble_tracker: PerformanceTracker::new(),
            history: RingBuffer::new(config.gate.history_cap),
            metrics: CoordinatorMetrics::default(),
            feedback_count: 0,
            min_confidence: config.gate.min_confidence,
            degraded,
        };

        Ok(Self {
            combiner: EnsembleCombiner::new(&config.ensemble),
            quality: DataQualityAssessor::new(&config.quality),
            config,
            provider,
            backends,
            store,
            shared: Mutex::new(shared),
        })
    }

    /// Construct a coordinator persisting learning state to the JSON file at
    /// `config.persistence.state_path`. Hosts with their own store use
    /// [`PredictionCoordinator::new`] instead.
    pub async fn with_file_store(
        config: CoordinatorConfig,
        provider: Arc<dyn DataProvider>,
        backends: BackendRegistry,
    ) -> Result<Self> {
        let store = Arc::new(JsonFileStore::new(&config.persistence.state_path));
        Self::new(config, provider, backends, store).await
    }

    /// Run one coordinated forecast for a symbol.
    ///
    /// Errors only when data preparation fails or every backend fails
    /// (`NoForecastAvailable`); a rejected decision is still a normal
    /// return, with the recommendation explaining why.
    pub async fn predict(&self, symbol: &str, validate: bool) -> Result<CoordinatorDecision> {
        let started = Instant::now();
        info!(%symbol, "starting coordinated forecast");

        let series = self.provider.prepare(symbol, None).await?;
        if series.is_empty() {
            return Err(AugurError::Validation(format!(
                "prepared series for {symbol} has no rows"
            )));
        }
        let now = Utc::now();
        let data_quality = self.quality.assess(&series, now);
        debug!(
            stage = %RequestStage::DataEnriched,
            %symbol,
            data_quality,
            rows = series.len(),
            features = series.feature_count,
        );

        let regime = detect_regime(&series.closes);
        debug!(stage = %RequestStage::RegimeDetected, %symbol, %regime);

        // Point-in-time copy of the adaptive state; the lock is not held
        // across backend calls.
        let (weights, strategy, min_confidence) = {
            let shared = self.shared.lock().await;
            (
                shared.learner.weights_snapshot(),
                shared.learner.strategy_for(regime),
                shared.min_confidence,
            )
        };

        let ensemble = self
            .combiner
            .predict(symbol, &series, &self.backends, &weights)
            .await?;
        debug!(
            stage = %RequestStage::EnsembleScored,
            %symbol,
            prediction = ensemble.prediction,
            base_confidence = ensemble.confidence,
            uncertainty = ensemble.uncertainty,
            models = ensemble.per_model.len(),
        );

        let confidence = (ensemble.confidence + strategy.confidence_boost).clamp(0.0, 1.0);
        let trust_score = self.trust_score(confidence, data_quality, ensemble.uncertainty);
        let mut decision = gate(trust_score, self.config.gate.accept_threshold, min_confidence);
        debug!(stage = %RequestStage::TrustGated, %symbol, trust_score, %decision);

        if validate {
            if let Err(reason) = validate_forecast(ensemble.prediction, confidence) {
                warn!(%symbol, reason, "sanity validation failed, downgrading decision");
                decision = downgrade(decision);
            }
        }

        let result = CoordinatorDecision {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            prediction: ensemble.prediction,
            confidence,
            base_confidence: ensemble.confidence,
            confidence_adjustment: strategy.confidence_boost,
            interval: ensemble.interval,
            uncertainty: ensemble.uncertainty,
            data_quality,
            regime,
            weights,
            per_model: ensemble.per_model,
            trust_score,
            decision,
            recommendation: recommendation(decision, confidence, ensemble.uncertainty),
            processing_time_ms: started.elapsed().as_millis() as u64,
            timestamp: now,
        };

        {
            let mut shared = self.shared.lock().await;
            shared.history.push(DecisionRecord::from(&result));
            shared.metrics.record(decision, confidence);
        }

        info!(%symbol, %decision, trust_score, prediction = result.prediction, "forecast gated");
        Ok(result)
    }

    /// Close the learning loop with a realized outcome.
    ///
    /// Updates the ensemble performance tracker and the per-model weights
    /// for every model the most recent matching decision used (all
    /// registered models when none matches), nudges that decision's regime
    /// strategy, and persists learning state every N-th call, best-effort.
    pub async fn feedback(&self, symbol: &str, predicted: f64, actual: f64) {
        let mut shared = self.shared.lock().await;

        shared.ensemble_tracker.record(actual, predicted);

        let matching = shared
            .history
            .last()
            .filter(|record| record.symbol == symbol)
            .cloned();

        let models: Vec<ModelId> = match &matching {
            Some(record) => record.models_used.clone(),
            None => self.backends.keys().copied().collect(),
        };
        for model in models {
            shared.learner.record_error(model, predicted, actual);
        }

        if let Some(record) = &matching {
            shared
                .learner
                .update_regime_strategy(record.regime, predicted, actual);
        }

        if actual != 0.0 {
            let error = ((actual - predicted) / actual).abs();
            if error > RETRAIN_SIGNAL_ERROR {
                info!(%symbol, error_pct = error * 100.0, "large realized error, retraining signal");
            }
        }

        shared.feedback_count += 1;
        if shared.feedback_count % self.config.learning.save_every == 0 {
            let state = shared.learner.to_state();
            match self.store.save(&state).await {
                Ok(()) => {
                    shared.degraded = false;
                    debug!(feedback_count = shared.feedback_count, "learning state persisted");
                }
                Err(e) => {
                    shared.degraded = true;
                    warn!(error = %e, "failed to persist learning state");
                }
            }
        }
    }

    /// Update the caution/reject boundary at runtime.
    pub async fn set_min_confidence(&self, threshold: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AugurError::Validation(
                "threshold must be between 0 and 1".to_string(),
            ));
        }
        self.shared.lock().await.min_confidence = threshold;
        info!(threshold, "minimum confidence threshold updated");
        Ok(())
    }

    /// Aggregated metrics, learner report, and the most recent decisions.
    pub async fn performance_report(&self) -> PerformanceReport {
        let shared = self.shared.lock().await;
        PerformanceReport {
            metrics: shared.metrics.clone(),
            ensemble_accuracy: shared.ensemble_tracker.accuracy(),
            ensemble_predictions_made: shared.ensemble_tracker.predictions_made,
            learning: shared.learner.report(),
            recent_decisions: shared.history.tail(10).cloned().collect(),
            degraded: shared.degraded,
        }
    }

    /// The most recent `limit` decision records, oldest first.
    pub async fn recent_decisions(&self, limit: usize) -> Vec<DecisionRecord> {
        self.shared.lock().await.history.tail(limit).cloned().collect()
    }

    /// Number of decisions currently retained in the bounded history.
    pub async fn decision_history_len(&self) -> usize {
        self.shared.lock().await.history.len()
    }

    /// trust = w_c*confidence + w_q*quality + w_u*(1/(1+uncertainty)),
    /// clamped to [0, 1]. Coefficients are hand-tuned configuration.
    fn trust_score(&self, confidence: f64, data_quality: f64, uncertainty: f64) -> f64 {
        let gate = &self.config.gate;
        let normalized_uncertainty = 1.0 / (1.0 + uncertainty);
        (gate.confidence_weight * confidence
            + gate.quality_weight * data_quality
            + gate.uncertainty_weight * normalized_uncertainty)
            .clamp(0.0, 1.0)
    }
}

/// Sanity checks on a produced forecast. Never raised as an error; a
/// failure downgrades the decision one tier instead.
fn validate_forecast(prediction: f64, confidence: f64) -> std::result::Result<(), &'static str> {
    if !prediction.is_finite() {
        return Err("prediction is not finite");
    }
    if prediction <= 0.0 {
        return Err("prediction is non-positive");
    }
    if confidence < VALIDATION_CONFIDENCE_FLOOR {
        return Err("confidence below validation floor");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_forecast_rules() {
        assert!(validate_forecast(100.0, 0.8).is_ok());
        assert!(validate_forecast(100.0, 0.5).is_ok());
        assert!(validate_forecast(-1.0, 0.8).is_err());
        assert!(validate_forecast(0.0, 0.8).is_err());
        assert!(validate_forecast(f64::NAN, 0.8).is_err());
        assert!(validate_forecast(f64::INFINITY, 0.8).is_err());
        assert!(validate_forecast(100.0, 0.49).is_err());
    }
}
