//! Model handles — immutable, ready-to-serve inference artifacts
//!
//! A [`ModelHandle`] pairs a version identity with a [`Predictor`]. Handles are
//! built by a [`ModelLoader`], shared through `Arc`, and never mutated after
//! construction, so any number of in-flight requests may use one concurrently.

pub mod linear;
pub mod loader;

pub use linear::{LinearModel, ModelArtifact};
pub use loader::{ModelLoader, RegistryLoader, StaticModelLoader};

use crate::error::{Result, ServeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Version identity of a loaded model (e.g., "1", "2")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelVersion(String);

impl ModelVersion {
    /// Create a version identity
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Version as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelVersion {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Which version a loader should resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// Whatever the registry currently reports as newest
    Latest,
    /// A specific registered version
    Exact(String),
}

impl VersionSpec {
    /// Build a spec from an optional request value.
    ///
    /// `None`, blank strings and `"latest"` (any case) all mean [`VersionSpec::Latest`].
    pub fn from_request(version: Option<&str>) -> Self {
        match version.map(str::trim) {
            None | Some("") => Self::Latest,
            Some(v) if v.eq_ignore_ascii_case("latest") => Self::Latest,
            Some(v) => Self::Exact(v.to_string()),
        }
    }

    /// Path segment used when talking to a registry
    pub fn as_path_segment(&self) -> &str {
        match self {
            Self::Latest => "latest",
            Self::Exact(v) => v,
        }
    }
}

impl std::fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_path_segment())
    }
}

/// Inference capability behind a model handle
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Produce one prediction per feature vector, in input order
    async fn predict(&self, batch: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Feature dimensionality the model expects, if fixed
    fn input_dim(&self) -> Option<usize> {
        None
    }
}

/// A loaded, immutable model instance
pub struct ModelHandle {
    model: String,
    version: ModelVersion,
    loaded_at: SystemTime,
    predictor: Box<dyn Predictor>,
}

impl ModelHandle {
    /// Wrap a predictor as a ready-to-serve handle
    pub fn new(
        model: impl Into<String>,
        version: ModelVersion,
        predictor: impl Predictor + 'static,
    ) -> Self {
        Self {
            model: model.into(),
            version,
            loaded_at: SystemTime::now(),
            predictor: Box::new(predictor),
        }
    }

    /// Registered model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Version identity
    pub fn version(&self) -> &ModelVersion {
        &self.version
    }

    /// When the handle was constructed
    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }

    /// Feature dimensionality the model expects, if fixed
    pub fn input_dim(&self) -> Option<usize> {
        self.predictor.input_dim()
    }

    /// Run inference on a non-empty batch.
    ///
    /// The output always has exactly one value per input row; a predictor that
    /// breaks this is reported as a [`ServeError::PredictionFailure`].
    pub async fn predict(&self, batch: &[Vec<f64>]) -> Result<Vec<f64>> {
        if batch.is_empty() {
            return Err(ServeError::PredictionFailure(
                "batch must contain at least one feature vector".to_string(),
            ));
        }

        let predictions = self.predictor.predict(batch).await?;
        if predictions.len() != batch.len() {
            return Err(ServeError::PredictionFailure(format!(
                "model {} v{} returned {} predictions for {} inputs",
                self.model,
                self.version,
                predictions.len(),
                batch.len()
            )));
        }
        Ok(predictions)
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model", &self.model)
            .field("version", &self.version)
            .field("input_dim", &self.input_dim())
            .finish()
    }
}
