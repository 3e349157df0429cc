//! JSON-file learning-state store.
//!
//! The one concrete `LearningStateStore` this crate ships. Round-trips the
//! learner snapshot through a pretty-printed JSON file; the coordinator
//! treats both directions as best-effort.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::agents::LearningState;
use crate::error::Result;
use crate::platform::LearningStateStore;

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LearningStateStore for JsonFileStore {
    async fn save(&self, state: &LearningState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), "learning state saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<LearningState>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AdaptiveWeightLearner;
    use crate::config::LearningConfig;
    use crate::domain::{MarketRegime, ModelId};

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join("augur-tests")
            .join(format!("state-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_load_absent_state_is_none() {
        let store = JsonFileStore::new(temp_path());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let mut learner = AdaptiveWeightLearner::new(&LearningConfig::default(), &ModelId::ALL);
        learner.record_error(ModelId::Transformer, 100.0, 107.0);
        learner.update_regime_strategy(MarketRegime::Bull, 100.0, 101.0);
        let state = learner.to_state();

        let path = temp_path();
        let store = JsonFileStore::new(&path);
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(
            loaded.models[&ModelId::Transformer].weight,
            state.models[&ModelId::Transformer].weight
        );
        assert_eq!(
            loaded.strategies[&MarketRegime::Bull],
            state.strategies[&MarketRegime::Bull]
        );

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
