//! Server orchestrator — high-level coordinator for the canary service
//!
//! Ties together configuration, the model loader, the rollout controller,
//! metrics, and the HTTP entrypoint into a single manageable unit.

use crate::config::ServeConfig;
use crate::entrypoint::{self, ApiState};
use crate::error::Result;
use crate::model::{ModelLoader, RegistryLoader};
use crate::observability::ServeMetrics;
use crate::rollout::{RolloutController, SlotStore, TrafficRouter};
use crate::{HealthStatus, ServerState};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// The canary server, coordinating all components
pub struct CanaryServer {
    /// Configuration
    config: ServeConfig,
    /// State shared with request handlers
    api: Arc<ApiState>,
    /// Shutdown flag
    shutdown: Arc<AtomicBool>,
    /// Tells open connections to drain
    drain_tx: watch::Sender<bool>,
    /// Bound listener address, once started
    local_addr: RwLock<Option<SocketAddr>>,
    /// Accept-loop task handles
    handles: RwLock<Vec<tokio::task::JoinHandle<()>>>,
}

impl CanaryServer {
    /// Create a server that loads models from the configured HTTP registry
    pub fn from_config(config: ServeConfig) -> Result<Self> {
        let loader = Arc::new(RegistryLoader::from_config(&config.registry)?);
        Self::new(config, loader)
    }

    /// Create a server with an explicit model loader
    pub fn new(config: ServeConfig, loader: Arc<dyn ModelLoader>) -> Result<Self> {
        config.validate()?;

        let router = match config.routing.seed {
            Some(seed) => TrafficRouter::with_seed(seed),
            None => TrafficRouter::new(),
        };
        let metrics = Arc::new(ServeMetrics::new());
        let mut controller = RolloutController::new(
            Arc::new(SlotStore::new()),
            router,
            loader,
            config.routing.current_probability,
        )?
        .with_metrics(metrics.clone());
        if let Some(timeout) = config.predict_timeout() {
            controller = controller.with_predict_timeout(timeout);
        }

        let (drain_tx, drain_rx) = watch::channel(false);
        let api = Arc::new(ApiState {
            controller: Arc::new(controller),
            metrics,
            server_state: Arc::new(RwLock::new(ServerState::Created)),
            start_time: Instant::now(),
            active_connections: Arc::new(AtomicUsize::new(0)),
            max_body_bytes: config.max_body_bytes,
            shutdown: drain_rx,
        });

        Ok(Self {
            config,
            api,
            shutdown: Arc::new(AtomicBool::new(false)),
            drain_tx,
            local_addr: RwLock::new(None),
            handles: RwLock::new(Vec::new()),
        })
    }

    /// Start the server: load the initial model into both slots, then bind
    /// the listener. A load failure aborts startup before any traffic is accepted.
    pub async fn start(&self) -> Result<()> {
        self.set_state(ServerState::Starting);

        let version = match self.api.controller.initialize().await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "Initial model load failed");
                self.set_state(ServerState::Stopped);
                return Err(e);
            }
        };
        tracing::info!(version = %version, "Initial model loaded");

        let listen = self.config.listen_addr()?;
        let (addr, handle) = match entrypoint::start_http_entrypoint(listen, self.api.clone()).await
        {
            Ok(bound) => bound,
            Err(e) => {
                self.set_state(ServerState::Stopped);
                return Err(e);
            }
        };

        *self.local_addr.write().unwrap() = Some(addr);
        self.handles.write().unwrap().push(handle);

        self.set_state(ServerState::Running);
        tracing::info!(
            address = %addr,
            current_probability = self.api.controller.current_probability(),
            "Canary server is running"
        );

        Ok(())
    }

    /// Initiate graceful shutdown.
    ///
    /// Stops accepting connections and closes idle keep-alive connections.
    /// Requests already in flight get up to `shutdown_timeout_secs` to finish.
    pub async fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return; // Already shutting down
        }

        self.set_state(ServerState::Stopping);
        tracing::info!("Canary server shutting down");

        let handles: Vec<_> = self.handles.write().unwrap().drain(..).collect();
        for handle in handles {
            handle.abort();
            // Listener is closed once the accept loop is gone
            let _ = handle.await;
        }

        self.drain_tx.send_replace(true);

        let connections = &self.api.active_connections;
        let deadline = Instant::now() + Duration::from_secs(self.config.shutdown_timeout_secs);
        while connections.load(Ordering::Relaxed) > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let remaining = connections.load(Ordering::Relaxed);
        if remaining > 0 {
            tracing::warn!(
                connections = remaining,
                "Shutdown timeout reached with open connections"
            );
        }

        self.set_state(ServerState::Stopped);
        tracing::info!("Canary server stopped");
    }

    /// Wait for a shutdown signal (Ctrl+C)
    pub async fn wait_for_shutdown(&self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
        self.shutdown().await;
    }

    /// Get the current server state
    pub fn state(&self) -> ServerState {
        self.api.server_state.read().unwrap().clone()
    }

    /// Get a health status snapshot
    pub fn health(&self) -> HealthStatus {
        self.api.health()
    }

    /// Get the rollout controller
    pub fn controller(&self) -> &Arc<RolloutController> {
        &self.api.controller
    }

    /// Get the metrics collector
    pub fn metrics(&self) -> &Arc<ServeMetrics> {
        &self.api.metrics
    }

    /// Get the configuration
    pub fn config(&self) -> &ServeConfig {
        &self.config
    }

    /// Address the listener is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read().unwrap()
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    fn set_state(&self, new_state: ServerState) {
        let mut state = self.api.server_state.write().unwrap();
        tracing::debug!(from = %*state, to = %new_state, "State transition");
        *state = new_state;
    }
}
