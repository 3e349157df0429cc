//! Data quality scoring for prepared datasets.

use chrono::{DateTime, Utc};

use crate::config::QualityConfig;
use crate::domain::EnrichedSeries;

/// Scores a prepared dataset for completeness, recency, and volume
/// sufficiency. Never errors; poor data degrades the score instead.
#[derive(Debug, Clone)]
pub struct DataQualityAssessor {
    stale_after_days: f64,
    target_rows: usize,
}

impl DataQualityAssessor {
    pub fn new(config: &QualityConfig) -> Self {
        Self {
            stale_after_days: config.stale_after_days,
            target_rows: config.target_rows,
        }
    }

    /// Overall score in [0, 1]: unweighted mean of completeness, recency,
    /// and volume terms. Recency hits zero once the latest observation is
    /// `stale_after_days` old; volume saturates at `target_rows`.
    pub fn assess(&self, series: &EnrichedSeries, now: DateTime<Utc>) -> f64 {
        let completeness = (1.0 - series.missing_ratio).clamp(0.0, 1.0);

        let days_old = (now - series.last_observation).num_seconds() as f64 / 86_400.0;
        let recency = (1.0 - days_old / self.stale_after_days).clamp(0.0, 1.0);

        let volume = (series.len() as f64 / self.target_rows as f64).min(1.0);

        (completeness + recency + volume) / 3.0
    }
}

impl Default for DataQualityAssessor {
    fn default() -> Self {
        Self::new(&QualityConfig::default())
    }
}
