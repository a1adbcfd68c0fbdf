//! # A3S Canary
//!
//! A model serving router with zero-downtime canary rollout. Traffic is split
//! between the promoted `current` model and a freshly loaded `candidate`, and
//! an operator promotes the candidate once it has proven itself.
//!
//! ## Architecture
//!
//! ```text
//! Entrypoint → RolloutController → TrafficRouter → SlotStore → ModelHandle
//!                     │
//!                     └── ModelLoader (registry) → SlotStore.set
//! ```
//!
//! ## Core Features
//!
//! - **Two-slot serving**: `current` and `candidate`, swapped atomically
//! - **Probabilistic split**: each request independently goes to `current`
//!   with probability `p`
//! - **Live updates**: load a new candidate or promote it while predictions
//!   are in flight
//! - **Registry loading**: fetch model artifacts by version or `latest`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use a3s_canary::{CanaryServer, config::ServeConfig};
//!
//! #[tokio::main]
//! async fn main() -> a3s_canary::Result<()> {
//!     let config = ServeConfig::from_file("canary.hcl").await?;
//!     let server = CanaryServer::from_config(config)?;
//!     server.start().await?;
//!     server.wait_for_shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dashboard;
pub mod entrypoint;
pub mod error;
pub mod model;
pub mod observability;
pub mod rollout;
pub mod server;

// Re-export main types
pub use error::{Result, ServeError};
pub use model::{ModelHandle, ModelLoader, ModelVersion, VersionSpec};
pub use rollout::{RolloutController, Slot, SlotStore, TrafficRouter};
pub use server::CanaryServer;

use serde::{Deserialize, Serialize};

/// Server runtime state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ServerState {
    /// Server has been created but not yet started
    #[default]
    Created,
    /// Server is loading the initial model and binding its listener
    Starting,
    /// Server is accepting prediction and rollout requests
    Running,
    /// Server is draining connections and shutting down
    Stopping,
    /// Server has fully stopped
    Stopped,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Server health status snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Current server state
    pub state: ServerState,
    /// Uptime in seconds since the server was created
    pub uptime_secs: u64,
    /// Number of open client connections
    pub active_connections: usize,
    /// Total requests handled since start
    pub total_requests: u64,
    /// Whether both model slots hold a model
    pub ready: bool,
}
