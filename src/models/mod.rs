//! ML model inference components

pub mod decision;
pub mod fallback;
pub mod inference;
pub mod loader;
pub mod resolver;

pub use decision::{Decision, DecisionPolicy};
pub use fallback::fallback;
pub use inference::ClassifierService;
pub use loader::{Classifier, ModelLoader, OnnxModelLoader};
pub use resolver::ModelResolver;
