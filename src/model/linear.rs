//! Linear model — the artifact kind served from the registry

use crate::error::{Result, ServeError};
use crate::model::{ModelHandle, ModelVersion, Predictor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Registry artifact describing a linear model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Registered model name
    pub name: String,
    /// Concrete version (never "latest")
    pub version: String,
    /// One weight per input feature
    pub weights: Vec<f64>,
    /// Intercept
    #[serde(default)]
    pub bias: f64,
}

impl ModelArtifact {
    /// Create an artifact
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        weights: Vec<f64>,
        bias: f64,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            weights,
            bias,
        }
    }

    /// Check the artifact is servable
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(ServeError::LoadFailure(format!(
                "artifact for model '{}' has no version",
                self.name
            )));
        }
        if self.weights.is_empty() {
            return Err(ServeError::LoadFailure(format!(
                "artifact {} v{} has no weights",
                self.name, self.version
            )));
        }
        if self.weights.iter().any(|w| !w.is_finite()) || !self.bias.is_finite() {
            return Err(ServeError::LoadFailure(format!(
                "artifact {} v{} contains non-finite parameters",
                self.name, self.version
            )));
        }
        Ok(())
    }

    /// Validate and build a ready-to-serve handle
    pub fn into_handle(self) -> Result<ModelHandle> {
        self.validate()?;
        let version = ModelVersion::new(self.version);
        Ok(ModelHandle::new(self.name, version, LinearModel::new(self.weights, self.bias)))
    }
}

/// `y = bias + Σ wᵢ·xᵢ`
#[derive(Debug, Clone)]
pub struct LinearModel {
    weights: Vec<f64>,
    bias: f64,
}

impl LinearModel {
    /// Create a linear model
    pub fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    fn score(&self, row: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(row)
            .fold(self.bias, |acc, (w, x)| acc + w * x)
    }
}

#[async_trait]
impl Predictor for LinearModel {
    async fn predict(&self, batch: &[Vec<f64>]) -> Result<Vec<f64>> {
        let dim = self.weights.len();
        if let Some((idx, row)) = batch.iter().enumerate().find(|(_, r)| r.len() != dim) {
            return Err(ServeError::PredictionFailure(format!(
                "feature vector {} has {} values, model expects {}",
                idx,
                row.len(),
                dim
            )));
        }
        Ok(batch.iter().map(|row| self.score(row)).collect())
    }

    fn input_dim(&self) -> Option<usize> {
        Some(self.weights.len())
    }
}
