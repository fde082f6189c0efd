//! Type definitions for the retention service

pub mod message;
pub mod prediction;
pub mod profile;

pub use message::{RetentionRequest, RetentionResponse};
pub use prediction::{AttributionResult, Direction, FeatureAttribution, PredictionResult};
pub use profile::{ClientProfile, ProfileField};
