//! Client Retention Service Library
//!
//! Predicts whether a client is likely to return for service and explains
//! the prediction with per-feature Shapley attributions. Requests arrive
//! over NATS request/reply.

pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_extractor;
pub mod handler;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{ExplainabilityError, ModelLoadError, ServiceError, ValidationError};
pub use feature_extractor::{ColumnTransform, FeatureExtractor};
pub use handler::RequestHandler;
pub use models::{InferenceEngine, ModelArtifact, ModelLoader};
pub use producer::ResponsePublisher;
pub use types::{
    message::{RetentionRequest, RetentionResponse},
    prediction::{AttributionResult, Direction, FeatureAttribution, PredictionResult},
    profile::ClientProfile,
};
