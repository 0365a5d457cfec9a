//! Classifier service: lazy model loading, validation, inference and the
//! confidence decision, with every failure mapped to a fallback result.

use crate::config::ClassifierConfig;
use crate::models::decision::DecisionPolicy;
use crate::models::fallback::fallback;
use crate::models::loader::{Classifier, ModelLoader, OnnxModelLoader};
use crate::models::resolver::ModelResolver;
use crate::preprocessor::Preprocessor;
use crate::types::classification::{ClassScore, ClassificationResult, FallbackReason};
use crate::types::disease::DiseaseKey;
use crate::types::health::{HealthStatus, ModelState, ServiceHealth};
use crate::validation::ImageValidator;
use anyhow::Result;
use bytes::Bytes;
use chrono::Utc;
use ndarray::Array4;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Name reported by the health probe
pub const SERVICE_NAME: &str = "ml_classifier";

const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(5);

/// Rice leaf disease classifier.
///
/// Constructed once per process and shared behind an `Arc`. The model is
/// loaded lazily on first use; until a load succeeds every prediction
/// returns the fallback result, and the next call retries the load.
pub struct ClassifierService {
    resolver: ModelResolver,
    loader: Box<dyn ModelLoader>,
    validator: ImageValidator,
    preprocessor: Preprocessor,
    policy: DecisionPolicy,
    inference_timeout: Duration,
    /// Async queue in front of the model; one blocking task at a time
    inference_gate: Arc<Semaphore>,
    /// Loaded model; also serializes load attempts and inference
    model: Mutex<Option<Box<dyn Classifier>>>,
    /// Readable without waiting on inference
    state: RwLock<ModelState>,
}

impl ClassifierService {
    /// Service backed by ONNX Runtime, searching the default locations
    pub fn new(config: &ClassifierConfig) -> Self {
        Self::with_parts(
            config,
            ModelResolver::new(&config.model_path),
            Box::new(OnnxModelLoader::with_threads(config.onnx_threads)),
        )
    }

    /// Service with an explicit resolver and loader
    pub fn with_parts(
        config: &ClassifierConfig,
        resolver: ModelResolver,
        loader: Box<dyn ModelLoader>,
    ) -> Self {
        info!(
            model_path = %config.model_path,
            confidence_threshold = config.confidence_threshold,
            confidence_margin = config.confidence_margin,
            "Classifier service initialized"
        );

        Self {
            resolver,
            loader,
            validator: ImageValidator::new(&config.supported_formats),
            preprocessor: Preprocessor::new(),
            policy: DecisionPolicy::new(config.confidence_threshold, config.confidence_margin),
            inference_timeout: DEFAULT_INFERENCE_TIMEOUT,
            inference_gate: Arc::new(Semaphore::new(1)),
            model: Mutex::new(None),
            state: RwLock::new(ModelState::default()),
        }
    }

    /// Set the budget applied by [`predict_async`](Self::predict_async)
    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout = timeout;
        self
    }

    /// Load the model if it is not loaded yet.
    ///
    /// Returns true when a model is available. Failures are recorded in the
    /// model state and never propagated.
    pub fn load(&self) -> bool {
        let mut model = self.lock_model();
        if model.is_some() {
            return true;
        }

        let Some(path) = self.resolver.resolve_path() else {
            let message = "Model file not found in any expected location".to_string();
            error!("{}", message);
            self.record_state(false, Some(message), None);
            return false;
        };

        match catch_unwind(AssertUnwindSafe(|| self.loader.load(&path))) {
            Ok(Ok(classifier)) => {
                *model = Some(classifier);
                info!(path = %path.display(), "ML model loaded successfully");
                self.record_state(true, None, Some(path));
                true
            }
            Ok(Err(e)) => {
                let message = format!("Failed to load ML model: {:#}", e);
                error!(path = %path.display(), "{}", message);
                self.record_state(false, Some(message), Some(path));
                false
            }
            Err(_) => {
                let message = "Failed to load ML model: loader panicked".to_string();
                error!(path = %path.display(), "{}", message);
                self.record_state(false, Some(message), Some(path));
                false
            }
        }
    }

    /// Snapshot of the model lifecycle state
    pub fn status(&self) -> ModelState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Model loaded and ready for inference
    pub fn is_model_available(&self) -> bool {
        self.status().loaded
    }

    /// Classify image bytes.
    ///
    /// Always returns a structurally complete result; `success` is false
    /// when a fallback was substituted. The boolean mirrors
    /// `result.meets_threshold`.
    pub fn predict(&self, image_data: &[u8]) -> (ClassificationResult, bool) {
        if image_data.is_empty() {
            return self.fall_back(FallbackReason::NoImageData);
        }

        if !self.is_model_available() {
            info!("Model not loaded, attempting to load");
            if !self.load() {
                warn!("Failed to load model, using fallback behavior");
                return self.fall_back(FallbackReason::ModelUnavailable);
            }
        }

        let info = self.validator.validate(image_data);
        if !info.valid {
            let detail = info.error.unwrap_or_else(|| "Unknown error".to_string());
            error!(error = %detail, file_size = info.file_size, "Invalid image data");
            return self.fall_back(FallbackReason::InvalidImage(detail));
        }
        if let Some(warning) = &info.warning {
            warn!(warning = %warning, "Image validation warning");
        }

        let Some(tensor) = self.preprocessor.preprocess(image_data) else {
            return self.fall_back(FallbackReason::PreprocessingFailed);
        };

        let scores = match self.run_model(&tensor) {
            Ok(scores) => scores,
            Err(e) => {
                error!(error = %e, "Model prediction failed");
                return self.fall_back(FallbackReason::InferenceFailed(format!("{:#}", e)));
            }
        };

        self.classify(&scores)
    }

    /// Classify on the blocking pool under the inference timeout.
    ///
    /// Callers queue on the inference gate before the timed section, so the
    /// budget covers only this request's own work. A timed-out task keeps
    /// its gate permit until it finishes; its result is discarded.
    pub async fn predict_async(self: &Arc<Self>, image_data: Bytes) -> (ClassificationResult, bool) {
        if image_data.is_empty() {
            return self.fall_back(FallbackReason::NoImageData);
        }

        let permit = match Arc::clone(&self.inference_gate).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(error = %e, "Inference gate closed");
                return self.fall_back(FallbackReason::InferenceFailed(e.to_string()));
            }
        };

        let service = Arc::clone(self);
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            service.predict(&image_data)
        });

        match tokio::time::timeout(self.inference_timeout, task).await {
            Ok(Ok(prediction)) => prediction,
            Ok(Err(e)) => {
                error!(error = %e, "Inference task failed");
                self.fall_back(FallbackReason::InferenceFailed(e.to_string()))
            }
            Err(_) => {
                let timeout_ms = self.inference_timeout.as_millis() as u64;
                warn!(timeout_ms, "Inference timed out");
                self.fall_back(FallbackReason::InferenceTimeout { timeout_ms })
            }
        }
    }

    /// Health snapshot for liveness/readiness probes. Does not touch the
    /// filesystem or the model.
    pub fn get_service_health(&self) -> ServiceHealth {
        let state = self.status();

        ServiceHealth {
            service: SERVICE_NAME.to_string(),
            status: if state.loaded {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            model_loaded: state.loaded,
            model_available: state.loaded,
            load_error: state.load_error,
            model_path: state.model_path.map(|p| p.display().to_string()),
            class_count: DiseaseKey::COUNT,
            supported_formats: self.validator.supported_formats().to_vec(),
            target_image_size: self.preprocessor.target_size(),
            confidence_threshold: self.policy.threshold,
            confidence_margin: self.policy.margin,
            timestamp: Utc::now(),
        }
    }

    /// Turn raw model scores into a classification result
    fn classify(&self, scores: &[f32]) -> (ClassificationResult, bool) {
        if scores.len() != DiseaseKey::COUNT {
            error!(
                expected = DiseaseKey::COUNT,
                actual = scores.len(),
                "Prediction output size mismatch"
            );
            return self.fall_back(FallbackReason::OutputMismatch {
                expected: DiseaseKey::COUNT,
                actual: scores.len(),
            });
        }

        if scores.iter().any(|s| !s.is_finite()) {
            error!(scores = ?scores, "Model produced non-finite scores");
            return self.fall_back(FallbackReason::InferenceFailed(
                "non-finite class scores".to_string(),
            ));
        }

        let Some(decision) = self.policy.decide(scores) else {
            return self.fall_back(FallbackReason::OutputMismatch {
                expected: DiseaseKey::COUNT,
                actual: 0,
            });
        };
        let Some(disease_key) = DiseaseKey::from_index(decision.top_index) else {
            return self.fall_back(FallbackReason::InferenceFailed(format!(
                "invalid predicted class index {}",
                decision.top_index
            )));
        };

        let raw_top = scores[decision.top_index];
        if !(0.0..=1.0).contains(&raw_top) {
            warn!(confidence = raw_top, "Unexpected confidence value, clamping");
        }

        let all_scores = DiseaseKey::ALL
            .iter()
            .zip(scores)
            .map(|(&disease_key, &confidence)| ClassScore {
                disease_key,
                confidence,
            })
            .collect();

        let result = ClassificationResult {
            disease_key,
            confidence: decision.confidence,
            all_scores,
            meets_threshold: decision.meets_threshold,
            success: true,
            fallback_kind: None,
            fallback_reason: None,
        };

        info!(
            disease = %disease_key,
            confidence = decision.confidence,
            margin = decision.margin,
            meets_threshold = decision.meets_threshold,
            "Prediction successful"
        );

        (result, decision.meets_threshold)
    }

    fn run_model(&self, tensor: &Array4<f32>) -> Result<Vec<f32>> {
        let mut model = self.lock_model();
        let Some(classifier) = model.as_mut() else {
            anyhow::bail!("Model not loaded");
        };

        match catch_unwind(AssertUnwindSafe(|| classifier.forward(tensor))) {
            Ok(scores) => scores,
            Err(_) => anyhow::bail!("Model forward pass panicked"),
        }
    }

    fn fall_back(&self, reason: FallbackReason) -> (ClassificationResult, bool) {
        debug!(reason = %reason, "Generating fallback prediction");
        (fallback(reason), false)
    }

    fn lock_model(&self) -> MutexGuard<'_, Option<Box<dyn Classifier>>> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_state(&self, loaded: bool, load_error: Option<String>, model_path: Option<PathBuf>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = ModelState {
            loaded,
            load_error,
            model_path,
        };
    }
}
