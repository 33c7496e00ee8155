//! Configuration management for the delivery time predictor

use crate::schema::OrderSchema;
use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "DELIVERY_CONFIG";

/// Serialized model format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// ONNX inference graph, positional float input
    #[default]
    Onnx,
    /// Pickled estimator object, features matched by name
    Pickle,
    /// Native tree-ensemble checkpoint, positional features
    Checkpoint,
}

impl ModelBackend {
    /// Whether the backend reads features by position rather than by name
    pub fn is_positional(&self) -> bool {
        matches!(self, ModelBackend::Onnx | ModelBackend::Checkpoint)
    }
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub interval: IntervalConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming order requests
    pub orders_subject: String,
    /// Subject for outgoing estimates
    pub estimates_subject: String,
    /// Queue group shared by service replicas; unset means every replica sees every order
    #[serde(default)]
    pub queue_group: Option<String>,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Serialized model format
    #[serde(default)]
    pub backend: ModelBackend,
    /// Path to the model artifact
    pub path: String,
    /// Training column order artifact. Without it rows keep the record's own order.
    #[serde(default)]
    pub columns_path: Option<String>,
    /// Order schema accepted at the request boundary
    #[serde(default)]
    pub schema: OrderSchema,
    /// ONNX graph input name
    #[serde(default = "default_input_name")]
    pub input_name: String,
    /// Number of intra-op threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_input_name() -> String {
    "input".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

/// Confidence interval configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IntervalConfig {
    /// Attach a 95% interval to every estimate
    #[serde(default)]
    pub enabled: bool,
    /// Residual standard deviation artifact, read on every prediction
    #[serde(default = "default_residual_std_path")]
    pub residual_std_path: String,
}

fn default_residual_std_path() -> String {
    "artifacts/residual_std.pkl".to_string()
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            residual_std_path: default_residual_std_path(),
        }
    }
}

/// Service loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    30
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            metrics_interval_secs: default_metrics_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `$DELIVERY_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path, with `DELIVERY__*` overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("DELIVERY").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.model.onnx_threads == 0 {
            bail!("model.onnx_threads must be at least 1");
        }
        if self.model.input_name.trim().is_empty() {
            bail!("model.input_name must not be empty");
        }
        if self.service.metrics_interval_secs == 0 {
            bail!("service.metrics_interval_secs must be at least 1");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                orders_subject: "delivery.orders".to_string(),
                estimates_subject: "delivery.estimates".to_string(),
                queue_group: None,
            },
            model: ModelConfig {
                backend: ModelBackend::Onnx,
                path: "artifacts/model_catboost.onnx".to_string(),
                columns_path: Some("artifacts/columns.pkl".to_string()),
                schema: OrderSchema::Full,
                input_name: default_input_name(),
                onnx_threads: default_onnx_threads(),
            },
            interval: IntervalConfig::default(),
            service: ServiceConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
