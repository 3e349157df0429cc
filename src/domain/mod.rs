//! Core domain types shared across the prediction pipeline.

pub mod ring;

pub use ring::RingBuffer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported forecasting model backends.
///
/// A closed enumeration: adding a backend means adding a variant here and
/// registering a handle for it, never ad hoc string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelId {
    Transformer,
    Lstm,
}

impl ModelId {
    pub const ALL: [ModelId; 2] = [ModelId::Transformer, ModelId::Lstm];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Transformer => "transformer",
            ModelId::Lstm => "lstm",
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse label for recent price-trend/volatility character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketRegime {
    Bull,
    Bear,
    Sideways,
    Volatile,
}

impl std::fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketRegime::Bull => write!(f, "bull"),
            MarketRegime::Bear => write!(f, "bear"),
            MarketRegime::Sideways => write!(f, "sideways"),
            MarketRegime::Volatile => write!(f, "volatile"),
        }
    }
}

/// How the ensemble fuses per-model forecasts into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsembleMethod {
    /// Arithmetic mean of predictions.
    Average,
    /// Predictions weighted by normalized confidence x learner weight.
    ConfidenceWeighted,
    /// Median of predictions (robust to one outlier model).
    MedianVote,
}

impl Default for EnsembleMethod {
    fn default() -> Self {
        EnsembleMethod::ConfidenceWeighted
    }
}

/// A prepared dataset for one symbol, as returned by the data provider.
///
/// Enrichment itself (derived technical columns and so on) is opaque to this
/// crate; only the close series and the quality-relevant summary fields are
/// consumed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedSeries {
    pub symbol: String,
    /// Close prices, oldest first.
    pub closes: Vec<f64>,
    /// Number of derived feature columns the provider attached.
    pub feature_count: usize,
    /// Fraction of missing cells across the enriched frame, in [0, 1].
    pub missing_ratio: f64,
    /// Timestamp of the most recent observation.
    pub last_observation: DateTime<Utc>,
}

impl EnrichedSeries {
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}

/// One backend's contribution to an ensemble forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelForecast {
    pub model_id: ModelId,
    pub prediction: f64,
    pub confidence: f64,
}

/// Arithmetic mean; 0 for an empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (ddof = 0); 0 for fewer than two values.
pub(crate) fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Sample standard deviation (ddof = 1); 0 for fewer than two values.
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[100.0, 110.0]), 105.0);
        assert_eq!(population_std(&[100.0, 110.0]), 5.0);
        assert_eq!(population_std(&[42.0]), 0.0);
        // Sample std of [1, 2, 3] is 1.0 exactly.
        assert!((sample_std(&[1.0, 2.0, 3.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_model_id_serializes_lowercase() {
        let json = serde_json::to_string(&ModelId::Transformer).unwrap();
        assert_eq!(json, "\"transformer\"");
        let back: ModelId = serde_json::from_str("\"lstm\"").unwrap();
        assert_eq!(back, ModelId::Lstm);
    }
}
