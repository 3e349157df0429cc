//! augur — a multi-agent decision layer over point-forecast models.
//!
//! Blends several forecasting backends into one forecast, adapts blending
//! weights and confidence from observed outcomes, and gates each forecast
//! through a trust score before it reaches downstream consumers.
//!
//! Per-request flow: data enrichment and quality scoring, regime detection,
//! adaptive weight snapshot, ensemble combination, trust gate. The caller
//! later supplies the realized value through
//! [`PredictionCoordinator::feedback`], which closes the learning loop.
//!
//! Model training/inference, feature engineering, transport, and storage
//! are external collaborators behind the [`platform`] traits.

pub mod agents;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod platform;

pub use agents::{
    detect_regime, AdaptiveWeightLearner, DataQualityAssessor, EnsembleCombiner, EnsembleResult,
    LearningReport, LearningState, PerformanceTracker, RegimeStrategy,
};
pub use config::CoordinatorConfig;
pub use coordinator::{
    CoordinatorDecision, CoordinatorMetrics, Decision, DecisionRecord, PerformanceReport,
    PredictionCoordinator,
};
pub use domain::{
    EnrichedSeries, EnsembleMethod, MarketRegime, ModelForecast, ModelId, RingBuffer,
};
pub use error::{AugurError, Result};
pub use persistence::JsonFileStore;
pub use platform::{BackendRegistry, DataProvider, ForecastBackend, LearningStateStore};
