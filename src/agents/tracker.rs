//! Prediction performance tracking embedded in every agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relative error at or below which a prediction counts as successful.
pub const SUCCESS_ERROR_THRESHOLD: f64 = 0.05;

/// Counts of predictions made and successful, with a derived accuracy ratio.
///
/// Owned exclusively by its agent instance; mutated only through `record`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceTracker {
    pub created_at: DateTime<Utc>,
    pub predictions_made: u64,
    pub predictions_successful: u64,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            predictions_made: 0,
            predictions_successful: 0,
        }
    }

    /// Record one realized outcome. Success means relative error within 5%.
    /// A zero actual still counts the prediction but never as a success
    /// (relative error is undefined).
    pub fn record(&mut self, actual: f64, predicted: f64) {
        self.predictions_made += 1;
        if actual == 0.0 {
            return;
        }
        let error = ((actual - predicted) / actual).abs();
        if error <= SUCCESS_ERROR_THRESHOLD {
            self.predictions_successful += 1;
        }
    }

    /// Successful / made; 0 before any prediction is recorded.
    pub fn accuracy(&self) -> f64 {
        if self.predictions_made == 0 {
            return 0.0;
        }
        self.predictions_successful as f64 / self.predictions_made as f64
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_zero_before_any_prediction() {
        let tracker = PerformanceTracker::new();
        assert_eq!(tracker.accuracy(), 0.0);
    }

    #[test]
    fn test_success_within_five_percent() {
        let mut tracker = PerformanceTracker::new();
        tracker.record(100.0, 103.0); // 3% error: success
        tracker.record(100.0, 110.0); // 10% error: failure
        assert_eq!(tracker.predictions_made, 2);
        assert_eq!(tracker.predictions_successful, 1);
        assert_eq!(tracker.accuracy(), 0.5);
    }

    #[test]
    fn test_zero_actual_counts_but_never_succeeds() {
        let mut tracker = PerformanceTracker::new();
        tracker.record(0.0, 0.0);
        assert_eq!(tracker.predictions_made, 1);
        assert_eq!(tracker.predictions_successful, 0);
    }
}
