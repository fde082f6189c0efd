//! Configuration management for the retention service

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "RETENTION_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub explain: ExplainConfig,
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming prediction requests
    pub request_subject: String,
    /// Queue group shared by service replicas
    #[serde(default)]
    pub queue_group: Option<String>,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Path to the JSON model artifact
    pub artifact_path: String,
}

/// Attribution output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExplainConfig {
    /// Maximum number of attributions returned per response (all when unset)
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Request processing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Maximum number of requests processed concurrently
    pub workers: usize,
    /// Interval between metrics summaries in seconds
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    30
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
    /// Load configuration from `$RETENTION_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "retention.predict".to_string(),
                queue_group: None,
            },
            model: ModelConfig {
                artifact_path: "models/client_retention.json".to_string(),
            },
            explain: ExplainConfig::default(),
            service: ServiceConfig {
                workers: 4,
                metrics_interval_secs: default_metrics_interval(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.nats.request_subject, "retention.predict");
        assert_eq!(config.model.artifact_path, "models/client_retention.json");
        assert_eq!(config.explain.top_k, None);
        assert_eq!(config.service.workers, 4);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[nats]
url = "nats://nats:4222"
request_subject = "clients.retention"
queue_group = "retention-workers"

[model]
artifact_path = "/srv/models/client_retention.json"

[explain]
top_k = 5

[service]
workers = 8

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.nats.queue_group.as_deref(), Some("retention-workers"));
        assert_eq!(config.explain.top_k, Some(5));
        assert_eq!(config.service.workers, 8);
        assert_eq!(config.service.metrics_interval_secs, 30);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_bundled_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let config = AppConfig::load_from_path(path).unwrap();
        assert_eq!(config.model.artifact_path, "models/client_retention.json");
    }
}
