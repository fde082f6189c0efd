//! Prediction and attribution engine for client retention

use crate::config::AppConfig;
use crate::error::{ModelLoadError, ServiceError};
use crate::models::explainer::Explainer;
use crate::models::loader::{ModelArtifact, ModelLoader};
use crate::types::prediction::{AttributionResult, PredictionResult};
use crate::types::profile::ClientProfile;
use std::sync::Arc;
use tracing::debug;

/// Stateless prediction service over a shared, read-only model artifact.
///
/// The artifact is injected, so any number of engines (or threads) can share
/// one loaded model.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    artifact: Arc<ModelArtifact>,
}

impl InferenceEngine {
    /// Create an engine over an already loaded artifact
    pub fn new(artifact: Arc<ModelArtifact>) -> Self {
        Self { artifact }
    }

    /// Load the artifact named in the configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, ModelLoadError> {
        let artifact = ModelLoader::new().load_model(&config.model.artifact_path)?;
        Ok(Self::new(Arc::new(artifact)))
    }

    pub fn model_name(&self) -> &str {
        self.artifact.name()
    }

    /// Number of features the classifier consumes
    pub fn feature_count(&self) -> usize {
        self.artifact.extractor().feature_count()
    }

    pub fn artifact(&self) -> &Arc<ModelArtifact> {
        &self.artifact
    }

    /// Predict whether a client is likely to return
    pub fn predict(&self, profile: &ClientProfile) -> Result<PredictionResult, ServiceError> {
        profile.validate()?;

        let features = self.artifact.extractor().extract(profile);
        let probability = self.artifact.classifier().predict_proba(&features);
        let result = PredictionResult::from_probability(probability);

        debug!(
            model = %self.artifact.name(),
            label = result.label,
            probability = result.probability,
            "Prediction complete"
        );

        Ok(result)
    }

    /// Explain the prediction for a profile with ranked feature attributions
    pub fn explain(&self, profile: &ClientProfile) -> Result<AttributionResult, ServiceError> {
        profile.validate()?;

        let classifier = self.artifact.classifier();
        let explainer = Explainer::for_classifier(classifier)?;

        let extractor = self.artifact.extractor();
        let features = extractor.extract(profile);
        let contributions = explainer.shap_values(&features);

        let result = AttributionResult::from_contributions(
            extractor.features(),
            &contributions,
            explainer.base_value(),
            classifier.raw_output(&features),
        );

        debug!(
            model = %self.artifact.name(),
            base_value = result.base_value,
            output_value = result.output_value,
            top_feature = result.attributions.first().map(|a| a.feature_name.as_str()),
            "Attribution complete"
        );

        Ok(result)
    }

    /// Run prediction on a batch of profiles
    pub fn predict_batch(
        &self,
        profiles: &[ClientProfile],
    ) -> Vec<Result<PredictionResult, ServiceError>> {
        profiles.iter().map(|p| self.predict(p)).collect()
    }
}
