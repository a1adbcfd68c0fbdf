//! Dashboard API — serves health, rollout status, metrics, and version
//!
//! Read-only management endpoints, kept apart from the prediction and
//! rollout handlers in `entrypoint.rs`.

use crate::entrypoint::ApiState;
use serde::Serialize;

/// Version information
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl VersionInfo {
    pub(crate) fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Handle a dashboard request. Returns `None` for paths the dashboard does not own.
pub fn handle(path: &str, state: &ApiState) -> Option<DashboardResponse> {
    match path {
        "/health" | "/health/" => Some(DashboardResponse::json_of(200, &state.health())),
        "/status" | "/status/" => Some(DashboardResponse::json_of(
            200,
            &state.controller.status(),
        )),
        "/metrics" | "/metrics/" => Some(DashboardResponse {
            status: 200,
            content_type: "text/plain; version=0.0.4",
            body: state.metrics.render_prometheus(),
        }),
        "/version" | "/version/" => Some(DashboardResponse::json_of(200, &VersionInfo::current())),
        _ => None,
    }
}

/// Response produced by the API handlers
#[derive(Debug, Clone)]
pub struct DashboardResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Type header
    pub content_type: &'static str,
    /// Response body
    pub body: String,
}

impl DashboardResponse {
    pub(crate) fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    pub(crate) fn json_of<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_string_pretty(value).unwrap_or_default();
        Self::json(status, body)
    }

    pub(crate) fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }).to_string())
    }

    pub(crate) fn not_found(message: &str) -> Self {
        Self::error(404, message)
    }
}
