//! Ensemble forecast combination across model backends.
//!
//! Fuses forecasts from whichever registered backends respond into one
//! prediction with a confidence, an uncertainty measure, and an interval.
//! Backend failures are skipped, never retried; only total backend failure
//! is fatal to the request.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EnsembleConfig;
use crate::domain::{mean, population_std, EnrichedSeries, EnsembleMethod, ModelForecast, ModelId};
use crate::error::{AugurError, Result};
use crate::platform::BackendRegistry;

/// Z-score for the 95% normal-approximation band.
const INTERVAL_Z: f64 = 1.96;

/// One combined forecast. Created fresh per request; immutable once returned.
#[derive(Debug, Clone, Serialize)]
pub struct EnsembleResult {
    pub prediction: f64,
    /// Mean of per-model confidences with a disagreement penalty, in [0, 1].
    pub confidence: f64,
    /// 95% normal-approximation band around the mean prediction. An
    /// engineering heuristic, not a calibrated guarantee.
    pub interval: (f64, f64),
    pub per_model: Vec<ModelForecast>,
    /// Population stddev of per-model predictions.
    pub uncertainty: f64,
}

/// Merges N independent model forecasts into one.
#[derive(Debug, Clone)]
pub struct EnsembleCombiner {
    method: EnsembleMethod,
    model_priors: HashMap<ModelId, f64>,
    fallback_prior: f64,
    untrained_prior: f64,
}

impl EnsembleCombiner {
    pub fn new(config: &EnsembleConfig) -> Self {
        Self {
            method: config.method,
            model_priors: config.model_priors.clone(),
            fallback_prior: config.fallback_prior,
            untrained_prior: config.untrained_prior,
        }
    }

    /// Gather one forecast per registered backend and combine them.
    ///
    /// A failing backend is logged and skipped. Errors only when every
    /// backend fails.
    pub async fn predict(
        &self,
        symbol: &str,
        series: &EnrichedSeries,
        backends: &BackendRegistry,
        weights: &HashMap<ModelId, f64>,
    ) -> Result<EnsembleResult> {
        let mut forecasts = Vec::with_capacity(backends.len());

        for (model_id, backend) in backends {
            match backend.forecast(symbol, series).await {
                Ok(prediction) => {
                    let confidence =
                        self.model_confidence(*model_id, backend.has_trained_artifact(symbol));
                    debug!(%symbol, model = %model_id, prediction, confidence, "backend forecast");
                    forecasts.push(ModelForecast {
                        model_id: *model_id,
                        prediction,
                        confidence,
                    });
                }
                Err(e) => {
                    warn!(%symbol, model = %model_id, error = %e, "backend failed, skipping");
                }
            }
        }

        if forecasts.is_empty() {
            return Err(AugurError::NoForecastAvailable {
                symbol: symbol.to_string(),
            });
        }

        Ok(self.combine(&forecasts, weights))
    }

    /// Combine already-gathered forecasts using the configured strategy.
    pub fn combine(
        &self,
        forecasts: &[ModelForecast],
        weights: &HashMap<ModelId, f64>,
    ) -> EnsembleResult {
        let predictions: Vec<f64> = forecasts.iter().map(|f| f.prediction).collect();
        let confidences: Vec<f64> = forecasts.iter().map(|f| f.confidence).collect();

        let prediction = match self.method {
            EnsembleMethod::Average => mean(&predictions),
            EnsembleMethod::ConfidenceWeighted => {
                confidence_weighted(forecasts, weights).unwrap_or_else(|| mean(&predictions))
            }
            EnsembleMethod::MedianVote => median(&predictions),
        };

        let uncertainty = population_std(&predictions);
        let center = mean(&predictions);
        let interval = (
            center - INTERVAL_Z * uncertainty,
            center + INTERVAL_Z * uncertainty,
        );

        EnsembleResult {
            prediction,
            confidence: ensemble_confidence(&confidences),
            interval,
            per_model: forecasts.to_vec(),
            uncertainty,
        }
    }

    /// Static confidence prior per model family; a deliberately simple
    /// substitute for calibrated confidence. Untrained models get a lower
    /// prior.
    fn model_confidence(&self, model_id: ModelId, trained: bool) -> f64 {
        if !trained {
            return self.untrained_prior;
        }
        self.model_priors
            .get(&model_id)
            .copied()
            .unwrap_or(self.fallback_prior)
    }
}

/// Weighted mean of predictions, weighting each model by its self-reported
/// confidence scaled by the learner's weight for that model. `None` when
/// the effective weights are all zero.
fn confidence_weighted(
    forecasts: &[ModelForecast],
    weights: &HashMap<ModelId, f64>,
) -> Option<f64> {
    let effective: Vec<f64> = forecasts
        .iter()
        .map(|f| f.confidence * weights.get(&f.model_id).copied().unwrap_or(1.0))
        .collect();
    let total: f64 = effective.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let weighted = forecasts
        .iter()
        .zip(&effective)
        .map(|(f, w)| f.prediction * w)
        .sum::<f64>();
    Some(weighted / total)
}

/// Mean confidence with a disagreement penalty. The penalty term never drops
/// below half the mean confidence.
fn ensemble_confidence(confidences: &[f64]) -> f64 {
    if confidences.is_empty() {
        return 0.0;
    }
    let m = mean(confidences);
    let variance_penalty = 1.0 - population_std(confidences) / (m + 1e-6);
    (m * variance_penalty.max(0.5)).clamp(0.0, 1.0)
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ForecastBackend;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Arc;

    fn combiner(method: EnsembleMethod) -> EnsembleCombiner {
        let mut config = EnsembleConfig::default();
        config.method = method;
        EnsembleCombiner::new(&config)
    }

    fn forecast(model_id: ModelId, prediction: f64, confidence: f64) -> ModelForecast {
        ModelForecast {
            model_id,
            prediction,
            confidence,
        }
    }

    fn uniform_weights() -> HashMap<ModelId, f64> {
        HashMap::from([(ModelId::Transformer, 0.5), (ModelId::Lstm, 0.5)])
    }

    #[test]
    fn test_single_model_returns_its_prediction() {
        let forecasts = vec![forecast(ModelId::Transformer, 100.0, 0.8)];
        for method in [EnsembleMethod::Average, EnsembleMethod::ConfidenceWeighted] {
            let result = combiner(method).combine(&forecasts, &uniform_weights());
            assert_eq!(result.prediction, 100.0);
            assert_eq!(result.uncertainty, 0.0);
            assert_eq!(result.interval, (100.0, 100.0));
        }
    }

    #[test]
    fn test_median_vote_two_and_three_models() {
        let two = vec![
            forecast(ModelId::Transformer, 100.0, 0.7),
            forecast(ModelId::Lstm, 120.0, 0.7),
        ];
        let result = combiner(EnsembleMethod::MedianVote).combine(&two, &uniform_weights());
        assert_eq!(result.prediction, 110.0);

        let three = vec![
            forecast(ModelId::Transformer, 100.0, 0.7),
            forecast(ModelId::Lstm, 120.0, 0.7),
            forecast(ModelId::Transformer, 200.0, 0.7),
        ];
        let result = combiner(EnsembleMethod::MedianVote).combine(&three, &uniform_weights());
        assert_eq!(result.prediction, 120.0);
    }

    #[test]
    fn test_confidence_weighted_matches_hand_computation() {
        let forecasts = vec![
            forecast(ModelId::Transformer, 100.0, 0.75),
            forecast(ModelId::Lstm, 110.0, 0.70),
        ];
        let result =
            combiner(EnsembleMethod::ConfidenceWeighted).combine(&forecasts, &uniform_weights());
        // (100*0.75 + 110*0.70) / 1.45
        assert!((result.prediction - 104.8276).abs() < 1e-3);
        // mean 0.725 with a small disagreement penalty
        assert!((result.confidence - 0.70).abs() < 1e-3);
        assert_eq!(result.uncertainty, 5.0);
        assert!((result.interval.0 - (105.0 - 1.96 * 5.0)).abs() < 1e-9);
        assert!((result.interval.1 - (105.0 + 1.96 * 5.0)).abs() < 1e-9);
    }

    #[test]
    fn test_all_zero_confidence_falls_back_to_average() {
        let forecasts = vec![
            forecast(ModelId::Transformer, 100.0, 0.0),
            forecast(ModelId::Lstm, 110.0, 0.0),
        ];
        let result =
            combiner(EnsembleMethod::ConfidenceWeighted).combine(&forecasts, &uniform_weights());
        assert_eq!(result.prediction, 105.0);
        assert_eq!(result.confidence, 0.0);
    }

    struct StubBackend {
        model_id: ModelId,
        prediction: std::result::Result<f64, String>,
        trained: bool,
    }

    #[async_trait]
    impl ForecastBackend for StubBackend {
        fn model_id(&self) -> ModelId {
            self.model_id
        }

        fn has_trained_artifact(&self, _symbol: &str) -> bool {
            self.trained
        }

        async fn forecast(&self, _symbol: &str, _series: &EnrichedSeries) -> Result<f64> {
            self.prediction
                .clone()
                .map_err(|reason| AugurError::BackendUnavailable {
                    model: self.model_id,
                    reason,
                })
        }
    }

    fn series() -> EnrichedSeries {
        EnrichedSeries {
            symbol: "TEST".to_string(),
            closes: vec![100.0; 60],
            feature_count: 8,
            missing_ratio: 0.0,
            last_observation: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_failed_backend_is_skipped() {
        let backends: BackendRegistry = HashMap::from([
            (
                ModelId::Transformer,
                Arc::new(StubBackend {
                    model_id: ModelId::Transformer,
                    prediction: Ok(100.0),
                    trained: true,
                }) as Arc<dyn ForecastBackend>,
            ),
            (
                ModelId::Lstm,
                Arc::new(StubBackend {
                    model_id: ModelId::Lstm,
                    prediction: Err("artifact store offline".to_string()),
                    trained: true,
                }) as Arc<dyn ForecastBackend>,
            ),
        ]);

        let result = combiner(EnsembleMethod::ConfidenceWeighted)
            .predict("TEST", &series(), &backends, &uniform_weights())
            .await
            .unwrap();
        assert_eq!(result.per_model.len(), 1);
        assert_eq!(result.prediction, 100.0);
    }

    #[tokio::test]
    async fn test_all_backends_failing_is_fatal() {
        let backends: BackendRegistry = HashMap::from([(
            ModelId::Transformer,
            Arc::new(StubBackend {
                model_id: ModelId::Transformer,
                prediction: Err("timeout".to_string()),
                trained: true,
            }) as Arc<dyn ForecastBackend>,
        )]);

        let err = combiner(EnsembleMethod::ConfidenceWeighted)
            .predict("TEST", &series(), &backends, &uniform_weights())
            .await
            .unwrap_err();
        assert!(matches!(err, AugurError::NoForecastAvailable { .. }));
    }

    #[tokio::test]
    async fn test_untrained_backend_gets_lower_prior() {
        let backends: BackendRegistry = HashMap::from([(
            ModelId::Transformer,
            Arc::new(StubBackend {
                model_id: ModelId::Transformer,
                prediction: Ok(100.0),
                trained: false,
            }) as Arc<dyn ForecastBackend>,
        )]);

        let result = combiner(EnsembleMethod::ConfidenceWeighted)
            .predict("TEST", &series(), &backends, &uniform_weights())
            .await
            .unwrap();
        assert_eq!(result.per_model[0].confidence, 0.5);
    }
}
