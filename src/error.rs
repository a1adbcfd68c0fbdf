//! Centralized error types for A3S Canary

use crate::rollout::Slot;
use std::time::Duration;
use thiserror::Error;

/// Canary serving error types
#[derive(Debug, Error)]
pub enum ServeError {
    /// A slot was read before any model was placed in it
    #[error("Model slot '{0}' is not ready")]
    NotReady(Slot),

    /// Registry lookup or artifact load failed
    #[error("Failed to load model: {0}")]
    LoadFailure(String),

    /// The model rejected the input batch
    #[error("Prediction failed: {0}")]
    PredictionFailure(String),

    /// Inference did not finish within the configured deadline
    #[error("Prediction timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ServeError {
    /// HTTP status reported to the caller for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotReady(_) => 503,
            Self::LoadFailure(_) | Self::PredictionFailure(_) => 400,
            Self::Timeout(_) => 504,
            Self::Serialization(_) => 400,
            Self::Config(_) | Self::Http(_) | Self::Io(_) | Self::Other(_) => 500,
        }
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, ServeError>;
