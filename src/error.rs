use thiserror::Error;

use crate::domain::ModelId;

/// Main error type for the prediction coordination layer
#[derive(Error, Debug)]
pub enum AugurError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Forecast backend errors
    /// One backend failed; recovered locally by skipping that model.
    #[error("Backend unavailable: {model} - {reason}")]
    BackendUnavailable { model: ModelId, reason: String },

    /// Every registered backend failed; fatal to the request.
    #[error("No forecast available for {symbol}: all backends failed")]
    NoForecastAvailable { symbol: String },

    // Persistence errors (learning state; best-effort by contract)
    #[error("Persistence failure: {0}")]
    Persistence(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for AugurError
pub type Result<T> = std::result::Result<T, AugurError>;
