//! Safe default classification used when the pipeline cannot run

use crate::types::classification::{ClassScore, ClassificationResult, FallbackReason};
use crate::types::disease::DiseaseKey;

/// Label reported whenever no real diagnosis is available
pub const FALLBACK_DISEASE: DiseaseKey = DiseaseKey::Healthy;

/// Synthetic confidence of the fallback label
pub const FALLBACK_CONFIDENCE: f32 = 0.5;

/// Score given to every other label
pub const FALLBACK_OTHER_SCORE: f32 = 0.2;

/// Build the fallback result for a failure reason.
///
/// Pure: the same reason always produces an equal result.
pub fn fallback(reason: FallbackReason) -> ClassificationResult {
    let all_scores = DiseaseKey::ALL
        .iter()
        .map(|&disease_key| ClassScore {
            disease_key,
            confidence: if disease_key == FALLBACK_DISEASE {
                FALLBACK_CONFIDENCE
            } else {
                FALLBACK_OTHER_SCORE
            },
        })
        .collect();

    ClassificationResult {
        disease_key: FALLBACK_DISEASE,
        confidence: FALLBACK_CONFIDENCE,
        all_scores,
        meets_threshold: false,
        success: false,
        fallback_kind: Some(reason.kind()),
        fallback_reason: Some(reason.to_string()),
    }
}
