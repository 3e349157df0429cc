//! Coordinator — per-request orchestration, trust gating, and the
//! feedback loop.

pub mod coordinator;
pub mod decision;

pub use coordinator::{PerformanceReport, PredictionCoordinator};
pub use decision::{
    CoordinatorDecision, CoordinatorMetrics, Decision, DecisionRecord, RequestStage,
};
