//! Entrypoint — HTTP listener for prediction and rollout requests
//!
//! Accepts connections, decodes JSON requests, and dispatches them to the
//! rollout controller or the dashboard.

use crate::dashboard::{self, DashboardResponse};
use crate::error::{Result, ServeError};
use crate::observability::ServeMetrics;
use crate::rollout::{RolloutController, Slot};
use crate::{HealthStatus, ServerState};
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// `POST /predict` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Ordered feature vectors
    pub features: Vec<Vec<f64>>,
}

/// `POST /predict` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    /// One prediction per feature vector, in request order
    pub predictions: Vec<f64>,
    /// Version of the model that served the request
    pub model_version: String,
    /// Slot the request was routed to
    pub slot: Slot,
}

/// `POST /update-model` request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateModelRequest {
    /// Version to load; absent means latest
    #[serde(default)]
    pub version: Option<String>,
}

/// Acknowledgement for rollout actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutResponse {
    pub message: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state for request handling
pub struct ApiState {
    pub controller: Arc<RolloutController>,
    pub metrics: Arc<ServeMetrics>,
    pub server_state: Arc<RwLock<ServerState>>,
    pub start_time: Instant,
    pub active_connections: Arc<AtomicUsize>,
    pub max_body_bytes: usize,
    /// Flips to `true` when open connections should finish and close
    pub shutdown: watch::Receiver<bool>,
}

impl ApiState {
    /// Health snapshot
    pub fn health(&self) -> HealthStatus {
        let slots = self.controller.slots();
        HealthStatus {
            state: self.server_state.read().unwrap().clone(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            total_requests: self.metrics.total_requests(),
            ready: Slot::ALL.iter().all(|s| slots.is_ready(*s)),
        }
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Bind the HTTP listener. Returns the bound address and the accept-loop task.
pub async fn start_http_entrypoint(
    addr: SocketAddr,
    state: Arc<ApiState>,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServeError::Other(format!("Failed to bind {}: {}", addr, e)))?;
    let local_addr = listener.local_addr()?;

    tracing::info!(address = %local_addr, "HTTP entrypoint listening");

    let handle = tokio::spawn(async move {
        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            let state = state.clone();
            let mut shutdown = state.shutdown.clone();
            tokio::spawn(async move {
                state.active_connections.fetch_add(1, Ordering::Relaxed);
                let io = TokioIo::new(stream);
                let conn = http1::Builder::new().serve_connection(
                    io,
                    service_fn(|req| handle_http_request(req, remote_addr, state.clone())),
                );
                let mut conn = std::pin::pin!(conn);

                // In-flight requests complete; idle keep-alive connections close.
                let mut draining = false;
                let result = loop {
                    tokio::select! {
                        result = conn.as_mut() => break result,
                        _ = shutdown.wait_for(|stop| *stop), if !draining => {
                            draining = true;
                            conn.as_mut().graceful_shutdown();
                        }
                    }
                };
                if let Err(e) = result {
                    tracing::debug!(
                        error = %e,
                        remote = %remote_addr,
                        "Connection closed with error"
                    );
                }
                state.active_connections.fetch_sub(1, Ordering::Relaxed);
            });
        }
    });

    Ok((local_addr, handle))
}

// ---------------------------------------------------------------------------
// Request handling
// ---------------------------------------------------------------------------

const ROLLOUT_PATHS: [&str; 4] = ["/predict", "/update-model", "/accept-next-model", "/promote"];

/// Handle an individual HTTP request
async fn handle_http_request(
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
    state: Arc<ApiState>,
) -> std::result::Result<hyper::Response<Full<Bytes>>, hyper::Error> {
    let start = Instant::now();
    let (parts, body) = req.into_parts();
    let method = parts.method;
    let path = parts.uri.path().to_string();

    let response = if ROLLOUT_PATHS.contains(&path.as_str()) {
        if method != Method::POST {
            DashboardResponse::error(405, "Method not allowed")
        } else {
            match read_body(body, state.max_body_bytes).await {
                Ok(bytes) => dispatch_rollout(&path, &bytes, &state).await,
                Err(resp) => resp,
            }
        }
    } else if method == Method::GET {
        dashboard::handle(&path, &state)
            .unwrap_or_else(|| DashboardResponse::not_found("Not found"))
    } else {
        DashboardResponse::not_found("Not found")
    };

    state.metrics.record_request(response.status);
    tracing::info!(
        target: "access_log",
        client_ip = %remote_addr.ip(),
        method = %method,
        path = %path,
        status = response.status,
        duration_ms = start.elapsed().as_millis() as u64,
        "request"
    );

    Ok(into_hyper(response))
}

/// Collect the request body, enforcing the size limit
async fn read_body(body: Incoming, limit: usize) -> std::result::Result<Bytes, DashboardResponse> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<http_body_util::LengthLimitError>() => Err(DashboardResponse::error(
            413,
            &format!("Request body exceeds {} bytes", limit),
        )),
        Err(e) => Err(DashboardResponse::error(
            400,
            &format!("Failed to read request body: {}", e),
        )),
    }
}

async fn dispatch_rollout(path: &str, body: &[u8], state: &ApiState) -> DashboardResponse {
    let result = match path {
        "/predict" => predict(body, state).await,
        "/update-model" => update_model(body, state).await,
        _ => promote(state),
    };
    result.unwrap_or_else(|e| error_response(&e))
}

async fn predict(body: &[u8], state: &ApiState) -> Result<DashboardResponse> {
    let request: PredictRequest = serde_json::from_slice(body)?;
    let outcome = state.controller.predict(&request.features).await?;
    Ok(DashboardResponse::json_of(
        200,
        &PredictResponse {
            predictions: outcome.predictions,
            model_version: outcome.version.to_string(),
            slot: outcome.slot,
        },
    ))
}

async fn update_model(body: &[u8], state: &ApiState) -> Result<DashboardResponse> {
    let request: UpdateModelRequest = if body.iter().all(u8::is_ascii_whitespace) {
        UpdateModelRequest::default()
    } else {
        serde_json::from_slice(body)?
    };

    let version = state
        .controller
        .update_candidate(request.version.as_deref())
        .await?;
    Ok(DashboardResponse::json_of(
        200,
        &RolloutResponse {
            message: format!("Candidate model updated to version {}", version),
            version: version.to_string(),
        },
    ))
}

fn promote(state: &ApiState) -> Result<DashboardResponse> {
    let version = state.controller.promote()?;
    Ok(DashboardResponse::json_of(
        200,
        &RolloutResponse {
            message: format!("Candidate version {} promoted to current", version),
            version: version.to_string(),
        },
    ))
}

fn error_response(error: &ServeError) -> DashboardResponse {
    let status = error.status_code();
    if status >= 500 && !matches!(error, ServeError::NotReady(_) | ServeError::Timeout(_)) {
        tracing::error!(error = %error, "Request failed");
    }
    DashboardResponse::error(status, &error.to_string())
}

fn into_hyper(resp: DashboardResponse) -> hyper::Response<Full<Bytes>> {
    let mut response = hyper::Response::new(Full::new(Bytes::from(resp.body)));
    *response.status_mut() =
        StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(resp.content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelArtifact, StaticModelLoader};
    use crate::rollout::{SlotStore, TrafficRouter};

    fn state(p: f64) -> ApiState {
        let loader = Arc::new(
            StaticModelLoader::new()
                .with_artifact(ModelArtifact::new("iris", "1", vec![1.0, 1.0], 0.0))
                .with_artifact(ModelArtifact::new("iris", "2", vec![2.0, 2.0], 0.0)),
        );
        let metrics = Arc::new(ServeMetrics::new());
        let controller = RolloutController::new(
            Arc::new(SlotStore::new()),
            TrafficRouter::with_seed(5),
            loader,
            p,
        )
        .unwrap()
        .with_metrics(metrics.clone());

        ApiState {
            controller: Arc::new(controller),
            metrics,
            server_state: Arc::new(RwLock::new(ServerState::Running)),
            start_time: Instant::now(),
            active_connections: Arc::new(AtomicUsize::new(0)),
            max_body_bytes: 1024,
            shutdown: watch::channel(false).1,
        }
    }

    fn body(resp: &DashboardResponse) -> serde_json::Value {
        serde_json::from_str(&resp.body).unwrap()
    }

    #[tokio::test]
    async fn test_predict_not_ready_is_503() {
        let state = state(1.0);
        let resp = dispatch_rollout("/predict", br#"{"features":[[1.0,2.0]]}"#, &state).await;
        assert_eq!(resp.status, 503);
        assert!(body(&resp)["error"].as_str().unwrap().contains("current"));
    }

    #[tokio::test]
    async fn test_predict_ok() {
        let state = state(1.0);
        state.controller.initialize().await.unwrap();

        let raw = br#"{"features":[[1.0,2.0],[0.5,0.5]]}"#;
        let resp = dispatch_rollout("/predict", raw, &state).await;
        assert_eq!(resp.status, 200);
        let json = body(&resp);
        assert_eq!(json["predictions"], serde_json::json!([6.0, 2.0]));
        assert_eq!(json["model_version"], "2");
        assert_eq!(json["slot"], "current");
    }

    #[tokio::test]
    async fn test_predict_shape_mismatch_is_400() {
        let state = state(1.0);
        state.controller.initialize().await.unwrap();
        let resp = dispatch_rollout("/predict", br#"{"features":[[1.0]]}"#, &state).await;
        assert_eq!(resp.status, 400);
    }

    #[tokio::test]
    async fn test_predict_malformed_body_is_400() {
        let state = state(1.0);
        state.controller.initialize().await.unwrap();
        let cases: [&[u8]; 3] = [b"not json", br#"{"rows":[[1.0]]}"#, br#"{"features":[["a"]]}"#];
        for raw in cases {
            let resp = dispatch_rollout("/predict", raw, &state).await;
            assert_eq!(resp.status, 400);
        }
    }

    #[tokio::test]
    async fn test_update_model_with_version() {
        let state = state(0.8);
        state.controller.initialize().await.unwrap();

        let resp = dispatch_rollout("/update-model", br#"{"version":"1"}"#, &state).await;
        assert_eq!(resp.status, 200);
        let json = body(&resp);
        assert_eq!(json["version"], "1");
        assert_eq!(json["message"], "Candidate model updated to version 1");
    }

    #[tokio::test]
    async fn test_update_model_empty_body_loads_latest() {
        let state = state(0.8);
        let resp = dispatch_rollout("/update-model", b"", &state).await;
        assert_eq!(resp.status, 200);
        assert_eq!(body(&resp)["version"], "2");
    }

    #[tokio::test]
    async fn test_update_model_unknown_version_is_400() {
        let state = state(0.8);
        state.controller.initialize().await.unwrap();
        let resp = dispatch_rollout("/update-model", br#"{"version":"42"}"#, &state).await;
        assert_eq!(resp.status, 400);
        assert_eq!(
            state.controller.slots().version(Slot::Candidate).unwrap().as_str(),
            "2"
        );
    }

    #[tokio::test]
    async fn test_promote_not_ready_is_503() {
        let state = state(0.8);
        let resp = dispatch_rollout("/accept-next-model", b"", &state).await;
        assert_eq!(resp.status, 503);
    }

    #[tokio::test]
    async fn test_promote_alias() {
        let state = state(0.8);
        state.controller.initialize().await.unwrap();
        state.controller.update_candidate(Some("1")).await.unwrap();

        let resp = dispatch_rollout("/promote", b"", &state).await;
        assert_eq!(resp.status, 200);
        assert_eq!(body(&resp)["version"], "1");
        assert_eq!(
            state.controller.slots().version(Slot::Current).unwrap().as_str(),
            "1"
        );
    }

    #[test]
    fn test_into_hyper_sets_status_and_content_type() {
        let resp = into_hyper(DashboardResponse::error(503, "down"));
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_health_reports_readiness() {
        let state = state(0.8);
        assert!(!state.health().ready);
        assert_eq!(state.health().state, ServerState::Running);
    }

    #[tokio::test]
    async fn test_drain_signal_closes_idle_keep_alive_connection() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (drain_tx, drain_rx) = watch::channel(false);
        let state = ApiState {
            shutdown: drain_rx,
            ..state(1.0)
        };
        let connections = state.active_connections.clone();
        let (addr, _handle) = start_http_entrypoint("127.0.0.1:0".parse().unwrap(), Arc::new(state))
            .await
            .unwrap();

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /version HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut buf = vec![0u8; 4096];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 200"));
        assert_eq!(connections.load(Ordering::Relaxed), 1);

        drain_tx.send_replace(true);

        // Server closes the idle connection instead of waiting for another request
        let mut rest = Vec::new();
        tokio::time::timeout(std::time::Duration::from_secs(1), stream.read_to_end(&mut rest))
            .await
            .expect("connection left open after drain signal")
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_bind_address() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();

        let result = start_http_entrypoint(addr, Arc::new(state(0.8))).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to bind"));
    }
}
