//! ONNX model loader

use anyhow::{Context, Result};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Model files smaller than this are suspicious but still loaded
const SUSPICIOUS_MODEL_SIZE: u64 = 1024 * 1024;

/// A loaded image classifier
pub trait Classifier: Send {
    /// Run the forward pass on a `(1, height, width, 3)` batch and return
    /// one score per class.
    fn forward(&mut self, input: &Array4<f32>) -> Result<Vec<f32>>;
}

/// Deserializes a classifier from a model file
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn Classifier>>;
}

/// Classifier backed by an ONNX Runtime session
pub struct OnnxClassifier {
    /// ONNX Runtime session
    session: Session,
    /// Input name for the model
    input_name: String,
    /// Output name for class scores
    output_name: String,
}

impl Classifier for OnnxClassifier {
    fn forward(&mut self, input: &Array4<f32>) -> Result<Vec<f32>> {
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = input.iter().copied().collect();
        let input_tensor =
            Tensor::from_array((shape, data)).context("Failed to create input tensor")?;

        let outputs = self
            .session
            .run(ort::inputs![&self.input_name => input_tensor])?;

        if let Some(output) = outputs.get(&self.output_name) {
            let (shape, scores) = output
                .try_extract_tensor::<f32>()
                .with_context(|| format!("Output '{}' is not an f32 tensor", self.output_name))?;
            debug!(output = %self.output_name, shape = ?shape, "Extracted class scores");
            return Ok(scores.to_vec());
        }

        // Fallback: first f32 tensor output that is not a label
        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Ok((_, scores)) = output.try_extract_tensor::<f32>() {
                debug!(output = %name, "Extracted class scores (fallback output)");
                return Ok(scores.to_vec());
            }
        }

        anyhow::bail!("Model produced no f32 score tensor")
    }
}

/// Loader for ONNX models
pub struct OnnxModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl OnnxModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn Classifier>> {
        let file_size = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat model file {:?}", path))?
            .len();
        if file_size < SUSPICIOUS_MODEL_SIZE {
            warn!(path = %path.display(), file_size, "Model file seems small");
        }

        info!(path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob") || o.name.contains("output"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "probabilities".to_string())
            });

        info!(
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(Box::new(OnnxClassifier {
            session,
            input_name,
            output_name,
        }))
    }
}

impl Default for OnnxModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
