//! Type definitions for the classifier service

pub mod classification;
pub mod disease;
pub mod health;
pub mod scan;

pub use classification::{ClassScore, ClassificationResult, FallbackKind, FallbackReason};
pub use disease::{DiseaseInfo, DiseaseKey};
pub use health::{HealthStatus, ModelState, ServiceHealth};
pub use scan::ScanOutcome;
