//! Classifier artifacts, inference and explanation

pub mod classifier;
pub mod explainer;
pub mod inference;
pub mod loader;

pub use classifier::Classifier;
pub use explainer::Explainer;
pub use inference::InferenceEngine;
pub use loader::{ModelArtifact, ModelLoader};
