//! RiceGuard Classifier Library
//!
//! Rice leaf disease classification with graceful degradation: the model is
//! loaded lazily from one of several candidate paths, images are validated
//! and preprocessed into a `(1, 224, 224, 3)` tensor, and results pass a
//! confidence threshold and margin check. Any failure yields a structurally
//! complete fallback result instead of an error.

pub mod config;
pub mod consumer;
pub mod metrics;
pub mod models;
pub mod preprocessor;
pub mod producer;
pub mod types;
pub mod validation;

pub use config::AppConfig;
pub use consumer::ScanConsumer;
pub use models::inference::ClassifierService;
pub use preprocessor::Preprocessor;
pub use producer::ResultProducer;
pub use types::{
    classification::{ClassScore, ClassificationResult, FallbackKind, FallbackReason},
    disease::{DiseaseInfo, DiseaseKey},
    scan::ScanOutcome,
};
pub use validation::{ImageInfo, ImageValidator};
