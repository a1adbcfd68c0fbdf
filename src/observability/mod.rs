//! Observability — serving and rollout metrics
//!
//! Provides Prometheus-compatible counters for predictions, errors and
//! rollout actions. Structured logging goes through `tracing`.

pub mod metrics;

pub use metrics::{MetricsSnapshot, ServeMetrics};
