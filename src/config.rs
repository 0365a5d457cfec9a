//! Configuration management for the classifier service

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub nats: NatsConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Model and decision-policy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Model file path, absolute or relative to a search root
    pub model_path: String,
    /// Minimum top-class confidence for an actionable result
    pub confidence_threshold: f64,
    /// Minimum gap between the top two scores for an actionable result
    pub confidence_margin: f64,
    /// Number of threads for ONNX inference (default: 1)
    pub onnx_threads: usize,
    /// Accepted image container formats
    pub supported_formats: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: "ml/model.onnx".to_string(),
            confidence_threshold: 0.50,
            confidence_margin: 0.30,
            onnx_threads: 1,
            supported_formats: vec![
                "JPEG".to_string(),
                "PNG".to_string(),
                "BMP".to_string(),
                "TIFF".to_string(),
            ],
        }
    }
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming scan images
    pub scan_subject: String,
    /// Subject for outcomes of scans sent without a reply subject
    pub result_subject: String,
    /// Request/reply subject for health probes
    pub health_subject: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            scan_subject: "scans.requests".to_string(),
            result_subject: "scans.results".to_string(),
            health_subject: "classifier.health".to_string(),
        }
    }
}

/// Worker pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum scans processed concurrently
    pub workers: usize,
    /// Inference timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            timeout_ms: 5000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Flat environment variables recognized for deployment compatibility
const FLAT_OVERRIDES: [(&str, &str); 3] = [
    ("MODEL_PATH", "classifier.model_path"),
    ("CONFIDENCE_THRESHOLD", "classifier.confidence_threshold"),
    ("CONFIDENCE_MARGIN", "classifier.confidence_margin"),
];

/// `RICEGUARD__SECTION__KEY` variables
fn environment() -> Environment {
    Environment::with_prefix("RICEGUARD")
        .prefix_separator("__")
        .separator("__")
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path.
    ///
    /// Precedence (lowest first): defaults, the TOML file if it exists,
    /// `RICEGUARD__SECTION__KEY` variables, then `MODEL_PATH`,
    /// `CONFIDENCE_THRESHOLD` and `CONFIDENCE_MARGIN`.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_env(path, environment(), |name| std::env::var(name).ok())
    }

    fn load_with_env<P, F>(path: P, environment: Environment, lookup: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(environment);

        for (var, key) in FLAT_OVERRIDES {
            builder = builder
                .set_override_option(key, lookup(var))
                .with_context(|| format!("Invalid override for {}", var))?;
        }

        let config: AppConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        let classifier = &self.classifier;
        if !(0.0..=1.0).contains(&classifier.confidence_threshold) {
            bail!(
                "confidence_threshold must be within [0, 1], got {}",
                classifier.confidence_threshold
            );
        }
        if !(0.0..=1.0).contains(&classifier.confidence_margin) {
            bail!(
                "confidence_margin must be within [0, 1], got {}",
                classifier.confidence_margin
            );
        }
        if classifier.model_path.trim().is_empty() {
            bail!("model_path must not be empty");
        }
        if self.pipeline.workers == 0 {
            bail!("pipeline.workers must be at least 1");
        }
        if self.pipeline.timeout_ms == 0 {
            bail!("pipeline.timeout_ms must be positive");
        }
        Ok(())
    }
}
