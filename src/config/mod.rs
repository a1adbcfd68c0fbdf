//! Configuration types for A3S Canary
//!
//! Describes the listener, the model registry, and the traffic split between
//! the current and candidate slots.
//! Uses HCL (HashiCorp Configuration Language) as the configuration format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, ServeError};

/// Top-level serving configuration
///
/// Uses HCL (HashiCorp Configuration Language) format.
///
/// # HCL Example
///
/// ```hcl
/// listen = "0.0.0.0:8000"
///
/// registry {
///   url   = "http://localhost:5000"
///   model = "tracking-quickstart"
/// }
///
/// routing {
///   current_probability = 0.8
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Listen address for the HTTP API (default: 0.0.0.0:8000)
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Model registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Traffic split settings
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Per-request inference deadline in milliseconds (default: 5000, 0 disables)
    #[serde(default = "default_predict_timeout")]
    pub predict_timeout_ms: u64,

    /// Maximum accepted request body size in bytes (default: 1 MiB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Graceful shutdown timeout in seconds (default: 30)
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

/// Model registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry base URL (default: http://localhost:5000)
    #[serde(default = "default_registry_url")]
    pub url: String,

    /// Registered model name (default: tracking-quickstart)
    #[serde(default = "default_model")]
    pub model: String,

    /// Timeout for a single artifact fetch in seconds (default: 30)
    #[serde(default = "default_registry_timeout")]
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            model: default_model(),
            timeout_secs: default_registry_timeout(),
        }
    }
}

/// Traffic split configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Fraction of requests (0.0..=1.0) sent to the current slot (default: 0.8)
    #[serde(default = "default_current_probability")]
    pub current_probability: f64,

    /// Fixed RNG seed for reproducible routing (default: OS entropy)
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            current_probability: default_current_probability(),
            seed: None,
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_registry_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_model() -> String {
    "tracking-quickstart".to_string()
}

fn default_registry_timeout() -> u64 {
    30
}

fn default_current_probability() -> f64 {
    0.8
}

fn default_predict_timeout() -> u64 {
    5000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl ServeConfig {
    /// Load configuration from an HCL file.
    ///
    /// The file must contain valid HCL content regardless of extension.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ServeError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_hcl(&content)
    }

    /// Parse configuration from an HCL string
    pub fn from_hcl(content: &str) -> Result<Self> {
        hcl::from_str(content)
            .map_err(|e| ServeError::Config(format!("Failed to parse HCL config: {}", e)))
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;

        let p = self.routing.current_probability;
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(ServeError::Config(format!(
                "routing.current_probability must be within [0, 1], got {}",
                p
            )));
        }

        if !self.registry.url.starts_with("http://") && !self.registry.url.starts_with("https://") {
            return Err(ServeError::Config(format!(
                "registry.url '{}' must start with http:// or https://",
                self.registry.url
            )));
        }

        if self.registry.model.trim().is_empty() {
            return Err(ServeError::Config(
                "registry.model must not be empty".to_string(),
            ));
        }

        if self.max_body_bytes == 0 {
            return Err(ServeError::Config(
                "max_body_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            ServeError::Config(format!("Invalid listen address '{}': {}", self.listen, e))
        })
    }

    /// Inference deadline, if enabled
    pub fn predict_timeout(&self) -> Option<Duration> {
        (self.predict_timeout_ms > 0).then(|| Duration::from_millis(self.predict_timeout_ms))
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            registry: RegistryConfig::default(),
            routing: RoutingConfig::default(),
            predict_timeout_ms: default_predict_timeout(),
            max_body_bytes: default_max_body_bytes(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ServeConfig::default();
        assert_eq!(config.listen, "0.0.0.0:8000");
        assert_eq!(config.registry.url, "http://localhost:5000");
        assert_eq!(config.registry.model, "tracking-quickstart");
        assert_eq!(config.routing.current_probability, 0.8);
        assert!(config.routing.seed.is_none());
        assert_eq!(config.predict_timeout(), Some(Duration::from_millis(5000)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_hcl() {
        let hcl = r#"
            listen = "127.0.0.1:9000"

            registry {
              url          = "https://registry.internal"
              model        = "iris"
              timeout_secs = 10
            }

            routing {
              current_probability = 0.95
              seed                = 42
            }

            predict_timeout_ms    = 250
            max_body_bytes        = 4096
            shutdown_timeout_secs = 5
        "#;
        let config = ServeConfig::from_hcl(hcl).unwrap();
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.registry.url, "https://registry.internal");
        assert_eq!(config.registry.model, "iris");
        assert_eq!(config.registry.timeout_secs, 10);
        assert_eq!(config.routing.current_probability, 0.95);
        assert_eq!(config.routing.seed, Some(42));
        assert_eq!(config.predict_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.max_body_bytes, 4096);
        assert_eq!(config.shutdown_timeout_secs, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_hcl_uses_defaults() {
        let config = ServeConfig::from_hcl(r#"listen = "127.0.0.1:8001""#).unwrap();
        assert_eq!(config.listen, "127.0.0.1:8001");
        assert_eq!(config.registry.model, "tracking-quickstart");
        assert_eq!(config.routing.current_probability, 0.8);
    }

    #[test]
    fn test_parse_invalid_hcl() {
        let result = ServeConfig::from_hcl("listen = ");
        assert!(matches!(result, Err(ServeError::Config(_))));
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = ServeConfig {
            predict_timeout_ms: 0,
            ..ServeConfig::default()
        };
        assert!(config.predict_timeout().is_none());
    }

    #[test]
    fn test_validate_probability_range() {
        for p in [-0.01, 1.01, f64::INFINITY] {
            let mut config = ServeConfig::default();
            config.routing.current_probability = p;
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("current_probability"));
        }

        for p in [0.0, 1.0] {
            let mut config = ServeConfig::default();
            config.routing.current_probability = p;
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_validate_listen_address() {
        let config = ServeConfig {
            listen: "not-an-address".to_string(),
            ..ServeConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid listen address"));
    }

    #[test]
    fn test_validate_registry_url_scheme() {
        let mut config = ServeConfig::default();
        config.registry.url = "ftp://registry".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_model() {
        let mut config = ServeConfig::default();
        config.registry.model = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_body_limit() {
        let config = ServeConfig {
            max_body_bytes: 0,
            ..ServeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"listen = "127.0.0.1:7000""#).unwrap();
        writeln!(file, "routing {{").unwrap();
        writeln!(file, "  current_probability = 0.5").unwrap();
        writeln!(file, "}}").unwrap();

        let config = ServeConfig::from_file(file.path()).await.unwrap();
        assert_eq!(config.listen, "127.0.0.1:7000");
        assert_eq!(config.routing.current_probability, 0.5);
    }

    #[tokio::test]
    async fn test_from_missing_file() {
        let err = ServeConfig::from_file("/nonexistent/canary.hcl")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = ServeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ServeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.listen, config.listen);
        assert_eq!(parsed.registry.model, config.registry.model);
    }
}
