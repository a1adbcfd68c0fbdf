//! Serving metrics — lightweight counters for predictions and rollout actions
//!
//! Provides in-process metrics tracking without external dependencies.
//! Metrics can be exported as JSON or rendered as Prometheus text format.

use crate::error::ServeError;
use crate::rollout::Slot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of all metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total HTTP requests handled
    pub total_requests: u64,
    /// Total responses by status code class (2xx, 4xx, 5xx)
    pub status_classes: HashMap<String, u64>,
    /// Successful predictions per slot
    pub slot_predictions: HashMap<String, u64>,
    /// Feature vectors scored
    pub rows_predicted: u64,
    /// Cumulative inference latency in microseconds (divide by predictions for avg)
    pub inference_latency_us: u64,
    /// Failed predictions by error kind
    pub prediction_errors: HashMap<String, u64>,
    /// Successful candidate updates
    pub candidate_updates: u64,
    /// Failed candidate updates
    pub candidate_update_failures: u64,
    /// Successful promotions
    pub promotions: u64,
}

/// Serving metrics collector
pub struct ServeMetrics {
    total_requests: AtomicU64,
    status_2xx: AtomicU64,
    status_4xx: AtomicU64,
    status_5xx: AtomicU64,
    current_predictions: AtomicU64,
    candidate_predictions: AtomicU64,
    rows_predicted: AtomicU64,
    inference_latency_us: AtomicU64,
    not_ready_errors: AtomicU64,
    prediction_failures: AtomicU64,
    timeouts: AtomicU64,
    candidate_updates: AtomicU64,
    candidate_update_failures: AtomicU64,
    promotions: AtomicU64,
}

impl ServeMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            status_2xx: AtomicU64::new(0),
            status_4xx: AtomicU64::new(0),
            status_5xx: AtomicU64::new(0),
            current_predictions: AtomicU64::new(0),
            candidate_predictions: AtomicU64::new(0),
            rows_predicted: AtomicU64::new(0),
            inference_latency_us: AtomicU64::new(0),
            not_ready_errors: AtomicU64::new(0),
            prediction_failures: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            candidate_updates: AtomicU64::new(0),
            candidate_update_failures: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
        }
    }

    /// Record a completed HTTP request
    pub fn record_request(&self, status: u16) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        match status / 100 {
            2 => {
                self.status_2xx.fetch_add(1, Ordering::Relaxed);
            }
            4 => {
                self.status_4xx.fetch_add(1, Ordering::Relaxed);
            }
            5 => {
                self.status_5xx.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    /// Record a successful prediction served by `slot`
    pub fn record_prediction(&self, slot: Slot, rows: usize, latency_us: u64) {
        match slot {
            Slot::Current => self.current_predictions.fetch_add(1, Ordering::Relaxed),
            Slot::Candidate => self.candidate_predictions.fetch_add(1, Ordering::Relaxed),
        };
        self.rows_predicted.fetch_add(rows as u64, Ordering::Relaxed);
        self.inference_latency_us.fetch_add(latency_us, Ordering::Relaxed);
    }

    /// Record a failed prediction
    pub fn record_prediction_error(&self, error: &ServeError) {
        let counter = match error {
            ServeError::NotReady(_) => &self.not_ready_errors,
            ServeError::Timeout(_) => &self.timeouts,
            _ => &self.prediction_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a candidate update
    pub fn record_candidate_update(&self, success: bool) {
        if success {
            self.candidate_updates.fetch_add(1, Ordering::Relaxed);
        } else {
            self.candidate_update_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a successful promotion
    pub fn record_promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    /// Successful promotions so far
    pub fn promotions(&self) -> u64 {
        self.promotions.load(Ordering::Relaxed)
    }

    /// Get total requests
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Take a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut status_classes = HashMap::new();
        status_classes.insert("2xx".to_string(), self.status_2xx.load(Ordering::Relaxed));
        status_classes.insert("4xx".to_string(), self.status_4xx.load(Ordering::Relaxed));
        status_classes.insert("5xx".to_string(), self.status_5xx.load(Ordering::Relaxed));

        let mut slot_predictions = HashMap::new();
        slot_predictions.insert(
            Slot::Current.to_string(),
            self.current_predictions.load(Ordering::Relaxed),
        );
        slot_predictions.insert(
            Slot::Candidate.to_string(),
            self.candidate_predictions.load(Ordering::Relaxed),
        );

        let mut prediction_errors = HashMap::new();
        prediction_errors.insert(
            "not_ready".to_string(),
            self.not_ready_errors.load(Ordering::Relaxed),
        );
        prediction_errors.insert(
            "prediction_failure".to_string(),
            self.prediction_failures.load(Ordering::Relaxed),
        );
        prediction_errors.insert("timeout".to_string(), self.timeouts.load(Ordering::Relaxed));

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            status_classes,
            slot_predictions,
            rows_predicted: self.rows_predicted.load(Ordering::Relaxed),
            inference_latency_us: self.inference_latency_us.load(Ordering::Relaxed),
            prediction_errors,
            candidate_updates: self.candidate_updates.load(Ordering::Relaxed),
            candidate_update_failures: self.candidate_update_failures.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
        }
    }

    /// Render metrics in Prometheus text exposition format
    pub fn render_prometheus(&self) -> String {
        let snap = self.snapshot();
        let mut output = String::new();

        output.push_str("# HELP canary_requests_total Total number of HTTP requests\n");
        output.push_str("# TYPE canary_requests_total counter\n");
        output.push_str(&format!("canary_requests_total {}\n", snap.total_requests));

        output.push_str("# HELP canary_responses_total Total responses by status class\n");
        output.push_str("# TYPE canary_responses_total counter\n");
        for class in ["2xx", "4xx", "5xx"] {
            let count = snap.status_classes.get(class).unwrap_or(&0);
            output.push_str(&format!(
                "canary_responses_total{{status_class=\"{}\"}} {}\n",
                class, count
            ));
        }

        output.push_str("# HELP canary_predictions_total Successful predictions by slot\n");
        output.push_str("# TYPE canary_predictions_total counter\n");
        for slot in Slot::ALL {
            let count = snap.slot_predictions.get(slot.as_str()).unwrap_or(&0);
            output.push_str(&format!(
                "canary_predictions_total{{slot=\"{}\"}} {}\n",
                slot, count
            ));
        }

        output.push_str("# HELP canary_rows_predicted_total Feature vectors scored\n");
        output.push_str("# TYPE canary_rows_predicted_total counter\n");
        output.push_str(&format!("canary_rows_predicted_total {}\n", snap.rows_predicted));

        output.push_str(
            "# HELP canary_inference_latency_us_total Cumulative inference latency in microseconds\n",
        );
        output.push_str("# TYPE canary_inference_latency_us_total counter\n");
        output.push_str(&format!(
            "canary_inference_latency_us_total {}\n",
            snap.inference_latency_us
        ));

        output.push_str("# HELP canary_prediction_errors_total Failed predictions by kind\n");
        output.push_str("# TYPE canary_prediction_errors_total counter\n");
        let mut kinds: Vec<_> = snap.prediction_errors.iter().collect();
        kinds.sort();
        for (kind, count) in kinds {
            output.push_str(&format!(
                "canary_prediction_errors_total{{kind=\"{}\"}} {}\n",
                kind, count
            ));
        }

        output.push_str("# HELP canary_candidate_updates_total Candidate updates by outcome\n");
        output.push_str("# TYPE canary_candidate_updates_total counter\n");
        output.push_str(&format!(
            "canary_candidate_updates_total{{outcome=\"success\"}} {}\n",
            snap.candidate_updates
        ));
        output.push_str(&format!(
            "canary_candidate_updates_total{{outcome=\"failure\"}} {}\n",
            snap.candidate_update_failures
        ));

        output.push_str("# HELP canary_promotions_total Candidate promotions\n");
        output.push_str("# TYPE canary_promotions_total counter\n");
        output.push_str(&format!("canary_promotions_total {}\n", snap.promotions));

        output
    }
}

impl Default for ServeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_metrics_zeroed() {
        let m = ServeMetrics::new();
        let snap = m.snapshot();
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.rows_predicted, 0);
        assert_eq!(snap.promotions, 0);
        assert_eq!(snap.slot_predictions["current"], 0);
        assert_eq!(snap.slot_predictions["candidate"], 0);
    }

    #[test]
    fn test_record_request_status_classes() {
        let m = ServeMetrics::new();
        m.record_request(200);
        m.record_request(201);
        m.record_request(400);
        m.record_request(503);
        m.record_request(504);

        let snap = m.snapshot();
        assert_eq!(m.total_requests(), 5);
        assert_eq!(snap.status_classes["2xx"], 2);
        assert_eq!(snap.status_classes["4xx"], 1);
        assert_eq!(snap.status_classes["5xx"], 2);
    }

    #[test]
    fn test_record_prediction_per_slot() {
        let m = ServeMetrics::new();
        m.record_prediction(Slot::Current, 5, 100);
        m.record_prediction(Slot::Current, 1, 50);
        m.record_prediction(Slot::Candidate, 2, 10);

        let snap = m.snapshot();
        assert_eq!(snap.slot_predictions["current"], 2);
        assert_eq!(snap.slot_predictions["candidate"], 1);
        assert_eq!(snap.rows_predicted, 8);
        assert_eq!(snap.inference_latency_us, 160);
    }

    #[test]
    fn test_record_prediction_errors_by_kind() {
        let m = ServeMetrics::new();
        m.record_prediction_error(&ServeError::NotReady(Slot::Candidate));
        m.record_prediction_error(&ServeError::PredictionFailure("shape".into()));
        m.record_prediction_error(&ServeError::PredictionFailure("shape".into()));
        m.record_prediction_error(&ServeError::Timeout(Duration::from_millis(5)));

        let snap = m.snapshot();
        assert_eq!(snap.prediction_errors["not_ready"], 1);
        assert_eq!(snap.prediction_errors["prediction_failure"], 2);
        assert_eq!(snap.prediction_errors["timeout"], 1);
    }

    #[test]
    fn test_rollout_counters() {
        let m = ServeMetrics::new();
        m.record_candidate_update(true);
        m.record_candidate_update(false);
        m.record_candidate_update(false);
        m.record_promotion();

        let snap = m.snapshot();
        assert_eq!(snap.candidate_updates, 1);
        assert_eq!(snap.candidate_update_failures, 2);
        assert_eq!(m.promotions(), 1);
    }

    #[test]
    fn test_render_prometheus() {
        let m = ServeMetrics::new();
        m.record_request(200);
        m.record_prediction(Slot::Candidate, 3, 42);
        m.record_promotion();

        let text = m.render_prometheus();
        assert!(text.contains("canary_requests_total 1"));
        assert!(text.contains("canary_responses_total{status_class=\"2xx\"} 1"));
        assert!(text.contains("canary_predictions_total{slot=\"candidate\"} 1"));
        assert!(text.contains("canary_predictions_total{slot=\"current\"} 0"));
        assert!(text.contains("canary_rows_predicted_total 3"));
        assert!(text.contains("canary_prediction_errors_total{kind=\"timeout\"} 0"));
        assert!(text.contains("canary_promotions_total 1"));
        assert!(text.contains("# TYPE canary_requests_total counter"));
    }

    #[test]
    fn test_snapshot_serialization() {
        let m = ServeMetrics::new();
        m.record_request(200);
        let json = serde_json::to_string(&m.snapshot()).unwrap();
        let parsed: MetricsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.total_requests, 1);
    }
}
