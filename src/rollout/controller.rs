//! Rollout controller — predict, update candidate, and promote
//!
//! Orchestrates the three rollout intents against the [`SlotStore`]. Only the
//! slot swap itself is shared between callers, so slow registry loads and slow
//! inference never block each other.

use crate::error::{Result, ServeError};
use crate::model::{ModelLoader, ModelVersion, VersionSpec};
use crate::observability::ServeMetrics;
use crate::rollout::{Slot, SlotStore, TrafficRouter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a single prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    /// One prediction per input row, in input order
    pub predictions: Vec<f64>,
    /// Slot the request was dispatched to
    pub slot: Slot,
    /// Version of the model that produced the predictions
    pub version: ModelVersion,
}

/// Snapshot of the rollout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutStatus {
    /// Version held by the current slot
    pub current: Option<ModelVersion>,
    /// Version held by the candidate slot
    pub candidate: Option<ModelVersion>,
    /// Fraction of traffic sent to the current slot
    pub current_probability: f64,
    /// Promotions since start
    pub promotions: u64,
}

/// Controller for a canary rollout between two model slots
pub struct RolloutController {
    slots: Arc<SlotStore>,
    router: TrafficRouter,
    loader: Arc<dyn ModelLoader>,
    metrics: Arc<ServeMetrics>,
    current_probability: f64,
    predict_timeout: Option<Duration>,
}

impl RolloutController {
    /// Create a controller. `current_probability` must lie in `[0, 1]`.
    pub fn new(
        slots: Arc<SlotStore>,
        router: TrafficRouter,
        loader: Arc<dyn ModelLoader>,
        current_probability: f64,
    ) -> Result<Self> {
        if !current_probability.is_finite() || !(0.0..=1.0).contains(&current_probability) {
            return Err(ServeError::Config(format!(
                "current_probability must be within [0, 1], got {}",
                current_probability
            )));
        }

        Ok(Self {
            slots,
            router,
            loader,
            metrics: Arc::new(ServeMetrics::new()),
            current_probability,
            predict_timeout: None,
        })
    }

    /// Bound each inference call
    pub fn with_predict_timeout(mut self, timeout: Duration) -> Self {
        self.predict_timeout = Some(timeout);
        self
    }

    /// Share a metrics collector with the caller
    pub fn with_metrics(mut self, metrics: Arc<ServeMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The slot store
    pub fn slots(&self) -> &Arc<SlotStore> {
        &self.slots
    }

    /// The metrics collector
    pub fn metrics(&self) -> &Arc<ServeMetrics> {
        &self.metrics
    }

    /// Fraction of traffic sent to the current slot
    pub fn current_probability(&self) -> f64 {
        self.current_probability
    }

    /// Load the registry's latest model into both slots.
    ///
    /// Called once at startup; a failure here must stop the service.
    pub async fn initialize(&self) -> Result<ModelVersion> {
        let handle = Arc::new(self.loader.load(&VersionSpec::Latest).await?);
        let version = handle.version().clone();

        self.slots.set(Slot::Current, handle.clone());
        self.slots.set(Slot::Candidate, handle);

        tracing::info!(
            loader = self.loader.name(),
            version = %version,
            "Both slots initialized"
        );
        Ok(version)
    }

    /// Dispatch a batch to the current or candidate model
    pub async fn predict(&self, batch: &[Vec<f64>]) -> Result<PredictionOutcome> {
        let slot = self.router.select(self.current_probability);
        match self.predict_on(slot, batch).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.metrics.record_prediction_error(&e);
                tracing::debug!(slot = %slot, error = %e, "Prediction failed");
                Err(e)
            }
        }
    }

    async fn predict_on(&self, slot: Slot, batch: &[Vec<f64>]) -> Result<PredictionOutcome> {
        // The handle stays alive for this request even if the slot is swapped.
        let handle = self.slots.get(slot)?;

        let start = Instant::now();
        let predictions = match self.predict_timeout {
            Some(limit) => tokio::time::timeout(limit, handle.predict(batch))
                .await
                .map_err(|_| ServeError::Timeout(limit))??,
            None => handle.predict(batch).await?,
        };
        let latency_us = start.elapsed().as_micros() as u64;

        self.metrics.record_prediction(slot, batch.len(), latency_us);

        Ok(PredictionOutcome {
            predictions,
            slot,
            version: handle.version().clone(),
        })
    }

    /// Load `version` (or latest) and make it the candidate.
    ///
    /// On failure the existing candidate is left untouched.
    pub async fn update_candidate(&self, version: Option<&str>) -> Result<ModelVersion> {
        let spec = VersionSpec::from_request(version);
        tracing::info!(requested = %spec, loader = self.loader.name(), "Loading candidate model");

        let handle = match self.loader.load(&spec).await {
            Ok(handle) => Arc::new(handle),
            Err(e) => {
                self.metrics.record_candidate_update(false);
                tracing::warn!(requested = %spec, error = %e, "Candidate update failed");
                return Err(e);
            }
        };

        let loaded = handle.version().clone();
        self.slots.set(Slot::Candidate, handle);
        self.metrics.record_candidate_update(true);

        tracing::info!(version = %loaded, "Candidate model updated");
        Ok(loaded)
    }

    /// Make the candidate the current model.
    ///
    /// The candidate slot keeps the same handle afterwards.
    pub fn promote(&self) -> Result<ModelVersion> {
        let handle = self.slots.get(Slot::Candidate)?;
        let version = handle.version().clone();

        let previous = self.slots.set(Slot::Current, handle);
        self.metrics.record_promotion();

        tracing::info!(
            version = %version,
            previous = %previous.map(|h| h.version().to_string()).unwrap_or_default(),
            "Candidate promoted to current"
        );
        Ok(version)
    }

    /// Current rollout snapshot
    pub fn status(&self) -> RolloutStatus {
        RolloutStatus {
            current: self.slots.version(Slot::Current),
            candidate: self.slots.version(Slot::Candidate),
            current_probability: self.current_probability,
            promotions: self.metrics.promotions(),
        }
    }
}
