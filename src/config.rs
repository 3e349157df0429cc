use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::domain::{EnsembleMethod, ModelId};

/// Main configuration structure for the prediction coordinator.
///
/// Every default is a hand-tuned constant inherited from the system this
/// layer gates for; they are deliberately kept as overridable configuration
/// rather than recalibrated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnsembleConfig {
    /// Combination strategy (default: confidence-weighted average)
    #[serde(default)]
    pub method: EnsembleMethod,
    /// Static confidence prior per model family
    #[serde(default = "default_model_priors")]
    pub model_priors: HashMap<ModelId, f64>,
    /// Prior for models with no configured entry
    #[serde(default = "default_fallback_prior")]
    pub fallback_prior: f64,
    /// Prior for models with no trained artifact for the symbol
    #[serde(default = "default_untrained_prior")]
    pub untrained_prior: f64,
}

fn default_model_priors() -> HashMap<ModelId, f64> {
    HashMap::from([(ModelId::Transformer, 0.75), (ModelId::Lstm, 0.70)])
}

fn default_fallback_prior() -> f64 {
    0.6
}

fn default_untrained_prior() -> f64 {
    0.5
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            method: EnsembleMethod::default(),
            model_priors: default_model_priors(),
            fallback_prior: default_fallback_prior(),
            untrained_prior: default_untrained_prior(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LearningConfig {
    /// Exponential-smoothing rate for weight updates
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Per-model error history capacity
    #[serde(default = "default_error_history_cap")]
    pub error_history_cap: usize,
    /// Number of most recent errors averaged into the candidate weight
    #[serde(default = "default_recent_error_window")]
    pub recent_error_window: usize,
    /// Persist learning state every N feedback calls
    #[serde(default = "default_save_every")]
    pub save_every: u64,
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_error_history_cap() -> usize {
    100
}

fn default_recent_error_window() -> usize {
    20
}

fn default_save_every() -> u64 {
    10
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            error_history_cap: default_error_history_cap(),
            recent_error_window: default_recent_error_window(),
            save_every: default_save_every(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// Trust score at or above which a forecast is accepted
    #[serde(default = "default_accept_threshold")]
    pub accept_threshold: f64,
    /// Trust score at or above which a forecast passes with caution
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Trust-score weight on final confidence
    #[serde(default = "default_confidence_weight")]
    pub confidence_weight: f64,
    /// Trust-score weight on data quality
    #[serde(default = "default_quality_weight")]
    pub quality_weight: f64,
    /// Trust-score weight on normalized uncertainty
    #[serde(default = "default_uncertainty_weight")]
    pub uncertainty_weight: f64,
    /// Decision history capacity
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

fn default_accept_threshold() -> f64 {
    0.75
}

fn default_min_confidence() -> f64 {
    0.6
}

fn default_confidence_weight() -> f64 {
    0.5
}

fn default_quality_weight() -> f64 {
    0.3
}

fn default_uncertainty_weight() -> f64 {
    0.2
}

fn default_history_cap() -> usize {
    1000
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            accept_threshold: default_accept_threshold(),
            min_confidence: default_min_confidence(),
            confidence_weight: default_confidence_weight(),
            quality_weight: default_quality_weight(),
            uncertainty_weight: default_uncertainty_weight(),
            history_cap: default_history_cap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QualityConfig {
    /// Days after which data recency scores zero
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: f64,
    /// Row count at which the volume term saturates at 1
    #[serde(default = "default_target_rows")]
    pub target_rows: usize,
}

fn default_stale_after_days() -> f64 {
    30.0
}

fn default_target_rows() -> usize {
    1000
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            stale_after_days: default_stale_after_days(),
            target_rows: default_target_rows(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Path for the JSON learning-state snapshot
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

fn default_state_path() -> String {
    "model/learning_state.json".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("AUGUR_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (AUGUR_GATE__MIN_CONFIDENCE, etc.)
            .add_source(
                Environment::with_prefix("AUGUR")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(0.0..=1.0).contains(&self.gate.accept_threshold) {
            errors.push("accept_threshold must be between 0 and 1".to_string());
        }

        if !(0.0..=1.0).contains(&self.gate.min_confidence) {
            errors.push("min_confidence must be between 0 and 1".to_string());
        }

        if self.gate.min_confidence > self.gate.accept_threshold {
            errors.push("min_confidence must not exceed accept_threshold".to_string());
        }

        let weight_sum = self.gate.confidence_weight
            + self.gate.quality_weight
            + self.gate.uncertainty_weight;
        if (weight_sum - 1.0).abs() > 1e-9 {
            errors.push(format!(
                "trust-score weights must sum to 1, got {weight_sum}"
            ));
        }

        if self.learning.learning_rate <= 0.0 || self.learning.learning_rate > 1.0 {
            errors.push("learning_rate must be in (0, 1]".to_string());
        }

        if self.learning.recent_error_window == 0
            || self.learning.recent_error_window > self.learning.error_history_cap
        {
            errors.push(
                "recent_error_window must be positive and at most error_history_cap".to_string(),
            );
        }

        if self.learning.save_every == 0 {
            errors.push("save_every must be positive".to_string());
        }

        if self.gate.history_cap == 0 {
            errors.push("history_cap must be positive".to_string());
        }

        if self.quality.stale_after_days <= 0.0 {
            errors.push("stale_after_days must be positive".to_string());
        }

        if self.quality.target_rows == 0 {
            errors.push("target_rows must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gate.accept_threshold, 0.75);
        assert_eq!(config.gate.min_confidence, 0.6);
        assert_eq!(config.learning.learning_rate, 0.1);
        assert_eq!(
            config.ensemble.model_priors[&ModelId::Transformer],
            0.75
        );
    }

    #[test]
    fn test_bad_thresholds_rejected() {
        let mut config = CoordinatorConfig::default();
        config.gate.min_confidence = 0.9; // above accept_threshold
        config.learning.learning_rate = 0.0;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
