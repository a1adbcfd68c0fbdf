//! Model loader — trait and implementations for resolving versions to handles
//!
//! Provides the `ModelLoader` async trait with two implementations:
//! - `RegistryLoader` — fetches artifacts from a model registry over HTTP
//! - `StaticModelLoader` — serves artifacts from memory (for tests and demos)

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::RegistryConfig;
use crate::error::{Result, ServeError};
use crate::model::{ModelArtifact, ModelHandle, VersionSpec};

/// Async trait for constructing model handles from a registry
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Resolve `version` and build a fully loaded handle.
    ///
    /// Any registry, transport or artifact problem is a [`ServeError::LoadFailure`].
    async fn load(&self, version: &VersionSpec) -> Result<ModelHandle>;

    /// Loader name (for logging)
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// RegistryLoader — fetches artifacts from an HTTP model registry
// ---------------------------------------------------------------------------

/// Model loader backed by an HTTP registry.
///
/// Artifacts are fetched from `GET {url}/models/{model}/versions/{version}`,
/// where `{version}` is either a concrete version or `latest`.
pub struct RegistryLoader {
    /// Base URL of the registry (e.g., "http://localhost:5000")
    base_url: reqwest::Url,
    /// Registered model name
    model: String,
    /// HTTP client
    client: reqwest::Client,
}

impl RegistryLoader {
    /// Create a registry loader with a per-request timeout
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = reqwest::Url::parse(base_url).map_err(|e| {
            ServeError::Config(format!("Invalid registry url '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ServeError::Config(format!(
                "Registry url '{}' cannot carry a path",
                base_url
            )));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            model: model.into(),
            client,
        })
    }

    /// Create a registry loader from configuration
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        Self::new(
            &config.url,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Artifact location; model and version are percent-encoded as single segments
    fn artifact_url(&self, version: &VersionSpec) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "models",
                self.model.as_str(),
                "versions",
                version.as_path_segment(),
            ]);
        }
        url
    }
}

#[async_trait]
impl ModelLoader for RegistryLoader {
    async fn load(&self, version: &VersionSpec) -> Result<ModelHandle> {
        let url = self.artifact_url(version);
        tracing::debug!(url = %url, "Fetching model artifact");

        let resp = self.client.get(url).send().await.map_err(|e| {
            ServeError::LoadFailure(format!(
                "registry request for {} v{} failed: {}",
                self.model, version, e
            ))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ServeError::LoadFailure(format!(
                "registry returned {} for {} v{}: {}",
                status, self.model, version, body
            )));
        }

        let artifact = resp.json::<ModelArtifact>().await.map_err(|e| {
            ServeError::LoadFailure(format!(
                "failed to parse artifact for {} v{}: {}",
                self.model, version, e
            ))
        })?;

        if let VersionSpec::Exact(requested) = version {
            if artifact.version != *requested {
                return Err(ServeError::LoadFailure(format!(
                    "registry returned version {} when {} was requested",
                    artifact.version, requested
                )));
            }
        }

        artifact.into_handle()
    }

    fn name(&self) -> &str {
        "registry"
    }
}

// ---------------------------------------------------------------------------
// StaticModelLoader — in-memory registry
// ---------------------------------------------------------------------------

/// Model loader that serves registered artifacts from memory.
///
/// `latest` resolves to the most recently registered version. Every load
/// request is recorded so callers can inspect what was asked for.
pub struct StaticModelLoader {
    artifacts: Mutex<Vec<ModelArtifact>>,
    requests: Mutex<Vec<VersionSpec>>,
    delay: Option<Duration>,
}

impl StaticModelLoader {
    /// Create an empty in-memory registry
    pub fn new() -> Self {
        Self {
            artifacts: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Register an artifact (builder form)
    pub fn with_artifact(self, artifact: ModelArtifact) -> Self {
        self.register(artifact);
        self
    }

    /// Sleep this long before answering each load, simulating a slow registry
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Register an artifact; a re-registered version replaces the old one and
    /// becomes the latest
    pub fn register(&self, artifact: ModelArtifact) {
        let mut artifacts = self.artifacts.lock().unwrap();
        artifacts.retain(|a| a.version != artifact.version);
        artifacts.push(artifact);
    }

    /// All load requests received so far
    pub fn requests(&self) -> Vec<VersionSpec> {
        self.requests.lock().unwrap().clone()
    }

    fn resolve(&self, version: &VersionSpec) -> Result<ModelArtifact> {
        let artifacts = self.artifacts.lock().unwrap();
        let found = match version {
            VersionSpec::Latest => artifacts.last(),
            VersionSpec::Exact(v) => artifacts.iter().find(|a| a.version == *v),
        };
        found.cloned().ok_or_else(|| {
            ServeError::LoadFailure(format!("version '{}' is not registered", version))
        })
    }
}

impl Default for StaticModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelLoader for StaticModelLoader {
    async fn load(&self, version: &VersionSpec) -> Result<ModelHandle> {
        self.requests.lock().unwrap().push(version.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.resolve(version)?.into_handle()
    }

    fn name(&self) -> &str {
        "static"
    }
}
