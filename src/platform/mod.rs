//! External collaborator interfaces.
//!
//! The coordination core stays decoupled from model training/inference,
//! feature engineering, and storage. Hosting applications implement these
//! traits and register handles at construction time.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::LearningState;
use crate::domain::{EnrichedSeries, ModelId};
use crate::error::Result;

/// One forecasting model backend, registered per `ModelId`.
///
/// How a backend produces its scalar forecast (trained artifacts, lazy
/// training, remote inference) is opaque to this crate.
#[async_trait]
pub trait ForecastBackend: Send + Sync {
    fn model_id(&self) -> ModelId;

    /// Whether a trained artifact exists for this symbol. Backends without
    /// one get a lower static confidence prior.
    fn has_trained_artifact(&self, symbol: &str) -> bool;

    /// Produce a scalar price forecast. Errors are recovered by skipping
    /// this model in the ensemble.
    async fn forecast(&self, symbol: &str, series: &EnrichedSeries) -> Result<f64>;
}

/// Prepares an enriched dataset for a symbol. Enrichment internals are
/// opaque; the core only needs the close series, a recency timestamp, and
/// a row count.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn prepare(&self, symbol: &str, raw_closes: Option<Vec<f64>>) -> Result<EnrichedSeries>;
}

/// Learning-state persistence. Best-effort by contract: the coordinator
/// logs failures and continues with in-memory defaults.
#[async_trait]
pub trait LearningStateStore: Send + Sync {
    async fn save(&self, state: &LearningState) -> Result<()>;

    /// `Ok(None)` when no state has been persisted yet.
    async fn load(&self) -> Result<Option<LearningState>>;
}

/// Registry mapping model identifiers to backend handles. Adding a backend
/// is a deliberate registration at construction time.
pub type BackendRegistry = HashMap<ModelId, Arc<dyn ForecastBackend>>;
