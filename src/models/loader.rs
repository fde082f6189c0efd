//! Model artifact loader

use crate::error::ModelLoadError;
use crate::feature_extractor::{ColumnTransform, FeatureExtractor};
use crate::models::classifier::Classifier;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Artifact format version understood by this loader
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// On-disk layout of a model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub format_version: u32,
    pub name: String,
    /// Preprocessing steps, applied in order
    pub preprocessor: Vec<ColumnTransform>,
    pub classifier: Classifier,
}

/// Validated preprocessing transform and classifier, loaded once and shared
/// read-only between callers.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    name: String,
    extractor: FeatureExtractor,
    classifier: Classifier,
}

impl ModelArtifact {
    /// Assemble an artifact, checking that the classifier fits the feature
    /// space produced by the preprocessing steps.
    pub fn new(
        name: impl Into<String>,
        preprocessor: Vec<ColumnTransform>,
        classifier: Classifier,
    ) -> Result<Self, ModelLoadError> {
        let extractor = FeatureExtractor::new(preprocessor)?;
        classifier.validate(extractor.feature_count())?;

        Ok(Self {
            name: name.into(),
            extractor,
            classifier,
        })
    }

    /// Parse and validate an artifact from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, ModelLoadError> {
        let file: ArtifactFile = serde_json::from_str(json)?;
        Self::from_file(file)
    }

    fn from_file(file: ArtifactFile) -> Result<Self, ModelLoadError> {
        if file.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ModelLoadError::UnsupportedVersion {
                found: file.format_version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }
        Self::new(file.name, file.preprocessor, file.classifier)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }
}

/// Loader for model artifacts
#[derive(Debug, Default)]
pub struct ModelLoader;

impl ModelLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a model artifact from a JSON file
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> Result<ModelArtifact, ModelLoadError> {
        let path = path.as_ref();

        info!(path = %path.display(), "Loading model artifact");

        let json = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact = ModelArtifact::from_json(&json)?;

        info!(
            model = %artifact.name(),
            classifier = artifact.classifier().kind(),
            features = artifact.extractor().feature_count(),
            "Model loaded successfully"
        );

        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ARTIFACT: &str = r#"{
        "format_version": 1,
        "name": "test_model",
        "preprocessor": [
            {"kind": "scale", "field": "age", "mean": 40.0, "scale": 10.0},
            {"kind": "one_hot", "field": "household", "categories": ["single", "family"]}
        ],
        "classifier": {
            "kind": "logistic_regression",
            "coefficients": [0.5, -0.2, 0.3],
            "intercept": 0.1,
            "background_means": [0.0, 0.6, 0.4]
        }
    }"#;

    #[test]
    fn test_load_model_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ARTIFACT.as_bytes()).unwrap();

        let artifact = ModelLoader::new().load_model(file.path()).unwrap();
        assert_eq!(artifact.name(), "test_model");
        assert_eq!(artifact.extractor().feature_count(), 3);
        assert_eq!(artifact.classifier().kind(), "logistic_regression");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ModelLoader::new().load_model(dir.path().join("missing.json"));
        assert!(matches!(result, Err(ModelLoadError::Io { .. })));
    }

    #[test]
    fn test_corrupt_artifact() {
        assert!(matches!(
            ModelArtifact::from_json("{ not json"),
            Err(ModelLoadError::Parse(_))
        ));
        // Unknown classifier family
        let json = ARTIFACT.replace("logistic_regression", "svm");
        assert!(matches!(
            ModelArtifact::from_json(&json),
            Err(ModelLoadError::Parse(_))
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let json = ARTIFACT.replace("\"format_version\": 1", "\"format_version\": 2");
        assert!(matches!(
            ModelArtifact::from_json(&json),
            Err(ModelLoadError::UnsupportedVersion {
                found: 2,
                expected: 1
            })
        ));
    }

    #[test]
    fn test_incompatible_classifier() {
        let json = ARTIFACT.replace("[0.5, -0.2, 0.3]", "[0.5, -0.2]");
        assert!(matches!(
            ModelArtifact::from_json(&json),
            Err(ModelLoadError::Incompatible(_))
        ));
    }

    #[test]
    fn test_tree_with_shared_child_rejected() {
        let json = r#"{
            "format_version": 1,
            "name": "shared_child",
            "preprocessor": [
                {"kind": "passthrough", "field": "age"}
            ],
            "classifier": {
                "kind": "gradient_boosting",
                "base_score": 0.0,
                "trees": [{"nodes": [
                    {"type": "split", "feature": 0, "threshold": 40.0, "left": 1, "right": 1, "cover": 10.0},
                    {"type": "leaf", "value": 0.3, "cover": 10.0}
                ]}]
            }
        }"#;
        assert!(matches!(
            ModelArtifact::from_json(json),
            Err(ModelLoadError::Incompatible(_))
        ));
    }

    #[test]
    fn test_bundled_artifact_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("models/client_retention.json");
        let artifact = ModelLoader::new().load_model(path).unwrap();
        assert_eq!(artifact.name(), "client_retention");
        assert!(artifact.extractor().feature_count() > 12);
    }

    #[test]
    fn test_bundled_tree_artifact_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("models/client_retention_gbt.json");
        let artifact = ModelLoader::new().load_model(path).unwrap();
        assert_eq!(artifact.classifier().kind(), "gradient_boosting");
        assert!(crate::models::explainer::Explainer::for_classifier(artifact.classifier()).is_ok());
    }
}
