//! Model lifecycle and service health reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle state of the classification model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    /// A model is loaded and ready for inference
    pub loaded: bool,
    /// Description of the last load failure
    pub load_error: Option<String>,
    /// Loaded model path, or the path of the last load attempt
    pub model_path: Option<PathBuf>,
}

/// Overall service status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Model loaded, real classifications available
    Healthy,
    /// Model unavailable, every prediction falls back
    Degraded,
}

/// Snapshot returned by the health probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub service: String,
    pub status: HealthStatus,
    pub model_loaded: bool,
    pub model_available: bool,
    pub load_error: Option<String>,
    pub model_path: Option<String>,
    pub class_count: usize,
    pub supported_formats: Vec<String>,
    pub target_image_size: (u32, u32),
    pub confidence_threshold: f64,
    pub confidence_margin: f64,
    pub timestamp: DateTime<Utc>,
}
