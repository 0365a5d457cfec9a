//! Scan outcome published by the worker

use crate::types::classification::ClassificationResult;
use crate::types::disease::DiseaseInfo;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Classification of one uploaded scan, ready for the scan handler to persist
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    /// Scan identifier (from the `Scan-Id` header, or generated)
    pub scan_id: String,

    /// Classifier output
    pub result: ClassificationResult,

    /// Result is confident enough to act on
    pub meets_threshold: bool,

    /// Catalog entry for the predicted label
    pub disease: DiseaseInfo,

    /// Wall time spent validating, preprocessing and classifying
    pub processing_time_ms: f64,

    /// Outcome generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl ScanOutcome {
    /// Create an outcome for a classified scan
    pub fn new(
        scan_id: String,
        result: ClassificationResult,
        meets_threshold: bool,
        processing_time_ms: f64,
    ) -> Self {
        let disease = result.disease_key.info();
        Self {
            scan_id,
            result,
            meets_threshold,
            disease,
            processing_time_ms,
            timestamp: Utc::now(),
        }
    }

    /// Generate a scan id when the request did not carry one
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
