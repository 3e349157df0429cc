//! Prediction agents — the building blocks the coordinator orchestrates.
//!
//! Each agent owns one concern: data quality scoring, regime detection,
//! ensemble combination, or adaptive weight learning. All of them are
//! driven by `PredictionCoordinator`.

pub mod adaptive;
pub mod ensemble;
pub mod quality;
pub mod regime;
pub mod tracker;

pub use adaptive::{
    AdaptiveWeightLearner, LearningReport, LearningState, ModelPerformanceRecord, ModelReport,
    PersistedModelRecord, RegimeStrategy,
};
pub use ensemble::{EnsembleCombiner, EnsembleResult};
pub use quality::DataQualityAssessor;
pub use regime::{detect_regime, REGIME_WINDOW};
pub use tracker::PerformanceTracker;
