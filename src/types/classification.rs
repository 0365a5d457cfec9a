//! Classification result data structures

use crate::types::disease::DiseaseKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Score assigned to a single label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub disease_key: DiseaseKey,
    pub confidence: f32,
}

/// Outcome of a single classification call.
///
/// Produced on every path, including failures: when `success` is false the
/// values come from the fallback table and `fallback_kind`/`fallback_reason`
/// say why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Top-ranked label
    pub disease_key: DiseaseKey,

    /// Score of the top-ranked label, clamped to [0, 1]
    pub confidence: f32,

    /// One entry per label, in label order
    pub all_scores: Vec<ClassScore>,

    /// Threshold and margin both satisfied
    pub meets_threshold: bool,

    /// False when a fallback was substituted
    pub success: bool,

    /// Category of the failure that triggered the fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_kind: Option<FallbackKind>,

    /// Human-readable failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl ClassificationResult {
    /// Score for a given label.
    pub fn score_for(&self, key: DiseaseKey) -> Option<f32> {
        self.all_scores
            .iter()
            .find(|s| s.disease_key == key)
            .map(|s| s.confidence)
    }

    /// Scores sorted from highest to lowest.
    pub fn ranked(&self) -> Vec<ClassScore> {
        let mut ranked = self.all_scores.clone();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        ranked
    }
}

/// Machine-readable category of a pipeline failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackKind {
    NoImageData,
    ModelUnavailable,
    InvalidImage,
    PreprocessingFailed,
    InferenceFailed,
    OutputMismatch,
    InferenceTimeout,
}

impl FallbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackKind::NoImageData => "no_image_data",
            FallbackKind::ModelUnavailable => "model_unavailable",
            FallbackKind::InvalidImage => "invalid_image",
            FallbackKind::PreprocessingFailed => "preprocessing_failed",
            FallbackKind::InferenceFailed => "inference_failed",
            FallbackKind::OutputMismatch => "output_mismatch",
            FallbackKind::InferenceTimeout => "inference_timeout",
        }
    }
}

/// Why the pipeline could not produce a real classification
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// Empty input
    NoImageData,
    /// Model missing or failed to load
    ModelUnavailable,
    /// Coarse validation rejected the image
    InvalidImage(String),
    /// Decode or tensor conversion failed
    PreprocessingFailed,
    /// Forward pass returned an error or unusable values
    InferenceFailed(String),
    /// Output vector length differs from the label count
    OutputMismatch { expected: usize, actual: usize },
    /// Inference exceeded the configured budget
    InferenceTimeout { timeout_ms: u64 },
}

impl FallbackReason {
    pub fn kind(&self) -> FallbackKind {
        match self {
            FallbackReason::NoImageData => FallbackKind::NoImageData,
            FallbackReason::ModelUnavailable => FallbackKind::ModelUnavailable,
            FallbackReason::InvalidImage(_) => FallbackKind::InvalidImage,
            FallbackReason::PreprocessingFailed => FallbackKind::PreprocessingFailed,
            FallbackReason::InferenceFailed(_) => FallbackKind::InferenceFailed,
            FallbackReason::OutputMismatch { .. } => FallbackKind::OutputMismatch,
            FallbackReason::InferenceTimeout { .. } => FallbackKind::InferenceTimeout,
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NoImageData => write!(f, "No image data provided"),
            FallbackReason::ModelUnavailable => write!(f, "Model not available"),
            FallbackReason::InvalidImage(msg) => write!(f, "Invalid image: {}", msg),
            FallbackReason::PreprocessingFailed => write!(f, "Image preprocessing failed"),
            FallbackReason::InferenceFailed(msg) => write!(f, "Model prediction failed: {}", msg),
            FallbackReason::OutputMismatch { expected, actual } => write!(
                f,
                "Model output format mismatch: expected {} scores, got {}",
                expected, actual
            ),
            FallbackReason::InferenceTimeout { timeout_ms } => {
                write!(f, "Inference timed out after {} ms", timeout_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_kind_mapping() {
        assert_eq!(FallbackReason::NoImageData.kind(), FallbackKind::NoImageData);
        assert_eq!(
            FallbackReason::OutputMismatch { expected: 5, actual: 3 }.kind(),
            FallbackKind::OutputMismatch
        );
        assert_eq!(
            FallbackReason::InferenceTimeout { timeout_ms: 10 }.to_string(),
            "Inference timed out after 10 ms"
        );
    }

    #[test]
    fn test_ranked_orders_descending() {
        let result = ClassificationResult {
            disease_key: DiseaseKey::Tungro,
            confidence: 0.7,
            all_scores: DiseaseKey::ALL
                .iter()
                .zip([0.1, 0.05, 0.1, 0.05, 0.7])
                .map(|(&disease_key, confidence)| ClassScore { disease_key, confidence })
                .collect(),
            meets_threshold: true,
            success: true,
            fallback_kind: None,
            fallback_reason: None,
        };

        let ranked = result.ranked();
        assert_eq!(ranked[0].disease_key, DiseaseKey::Tungro);
        assert_eq!(result.score_for(DiseaseKey::BrownSpot), Some(0.05));

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("fallback_reason").is_none());
        assert_eq!(json["disease_key"], "tungro");
    }
}
