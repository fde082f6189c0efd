//! Request handling independent of the transport

use crate::error::{ServiceError, ValidationError};
use crate::models::inference::InferenceEngine;
use crate::types::message::{resolve_request_id, RetentionRequest, RetentionResponse};
use crate::types::profile::ClientProfile;
use serde::Deserialize;
use tracing::{debug, warn};

/// Request with the profile left undecoded, so profile errors can be
/// reported under the caller's request id
#[derive(Debug, Deserialize)]
struct RequestEnvelope {
    #[serde(default)]
    request_id: Option<String>,
    profile: serde_json::Value,
    #[serde(default)]
    explain: bool,
}

/// Turns raw request payloads into responses
#[derive(Debug, Clone)]
pub struct RequestHandler {
    engine: InferenceEngine,
    top_k: Option<usize>,
}

impl RequestHandler {
    pub fn new(engine: InferenceEngine) -> Self {
        Self {
            engine,
            top_k: None,
        }
    }

    /// Limit the number of attributions returned per response
    pub fn with_top_k(mut self, top_k: Option<usize>) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    /// Decode a JSON payload and answer it.
    ///
    /// Payloads that are not a request envelope produce a `malformed` error
    /// with a fresh request id. A profile that does not decode (unknown
    /// category, wrong type, missing field) is a `validation` error under the
    /// caller's id.
    pub fn handle_payload(&self, payload: &[u8]) -> RetentionResponse {
        let envelope = match serde_json::from_slice::<RequestEnvelope>(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                let err = ValidationError::Malformed(e.to_string()).into();
                return self.reject(resolve_request_id(None), err);
            }
        };

        match serde_json::from_value::<ClientProfile>(envelope.profile) {
            Ok(profile) => self.handle(RetentionRequest {
                request_id: envelope.request_id,
                profile,
                explain: envelope.explain,
            }),
            Err(e) => {
                let err = ValidationError::InvalidProfile(e.to_string()).into();
                self.reject(resolve_request_id(envelope.request_id), err)
            }
        }
    }

    /// Answer a decoded request; an explanation failure fails the whole request.
    pub fn handle(&self, request: RetentionRequest) -> RetentionResponse {
        let request_id = resolve_request_id(request.request_id);
        let model = self.engine.model_name();

        let result = self.engine.predict(&request.profile).and_then(|prediction| {
            let response = RetentionResponse::success(request_id.clone(), model, prediction);
            if !request.explain {
                return Ok(response);
            }
            let mut attributions = self.engine.explain(&request.profile)?;
            if let Some(k) = self.top_k {
                attributions.truncate(k);
            }
            Ok(response.with_attributions(attributions))
        });

        match result {
            Ok(response) => {
                debug!(request_id = %request_id, "Request handled");
                response
            }
            Err(e) => self.reject(request_id, e),
        }
    }

    fn reject(&self, request_id: String, err: ServiceError) -> RetentionResponse {
        warn!(request_id = %request_id, kind = err.kind(), error = %err, "Request failed");
        RetentionResponse::failure(request_id, self.engine.model_name(), &err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::ColumnTransform;
    use crate::models::classifier::{Classifier, LogisticModel};
    use crate::models::loader::ModelArtifact;
    use crate::types::profile::{ClientProfile, ProfileField};
    use std::sync::Arc;

    fn handler(background: bool) -> RequestHandler {
        let preprocessor = vec![
            ColumnTransform::Scale {
                field: ProfileField::Age,
                mean: 40.0,
                scale: 10.0,
            },
            ColumnTransform::OneHot {
                field: ProfileField::Status,
                categories: vec![
                    "new".to_string(),
                    "returning".to_string(),
                    "inactive".to_string(),
                ],
            },
        ];
        let classifier = Classifier::LogisticRegression(LogisticModel {
            coefficients: vec![0.4, -0.3, 0.9, -1.1],
            intercept: 0.2,
            background_means: background.then(|| vec![0.0, 0.4, 0.4, 0.2]),
        });
        let artifact = ModelArtifact::new("mock", preprocessor, classifier).unwrap();
        RequestHandler::new(InferenceEngine::new(Arc::new(artifact)))
    }

    #[test]
    fn test_prediction_only() {
        let request = RetentionRequest::new(ClientProfile::default()).with_request_id("r1");
        let response = handler(true).handle(request);

        assert!(response.is_success());
        assert_eq!(response.request_id, "r1");
        assert_eq!(response.model, "mock");
        assert!(response.prediction.is_some());
        assert!(response.attributions.is_none());
    }

    #[test]
    fn test_explained_and_truncated() {
        let request = RetentionRequest::new(ClientProfile::default()).with_explanation();

        let response = handler(true).handle(request.clone());
        assert_eq!(response.attributions.map(|a| a.attributions.len()), Some(4));

        let response = handler(true).with_top_k(Some(2)).handle(request);
        let attributions = response.attributions.unwrap();
        assert_eq!(attributions.attributions.len(), 2);
    }

    #[test]
    fn test_validation_failure() {
        let profile = ClientProfile {
            age: 101,
            ..Default::default()
        };
        let response = handler(true).handle(RetentionRequest::new(profile));

        assert!(!response.is_success());
        assert!(response.prediction.is_none());
        assert_eq!(response.error.unwrap().kind, "validation");
    }

    #[test]
    fn test_explainability_failure_fails_request() {
        let request = RetentionRequest::new(ClientProfile::default()).with_explanation();
        let response = handler(false).handle(request);

        assert!(response.prediction.is_none());
        assert_eq!(response.error.unwrap().kind, "explainability");
    }

    #[test]
    fn test_malformed_payload() {
        let payloads: [&[u8]; 3] = [b"{ not json", b"\"text\"", b"{\"request_id\": \"r3\"}"];
        for payload in payloads {
            let response = handler(true).handle_payload(payload);
            assert_eq!(response.error.unwrap().kind, "malformed");
            assert!(!response.request_id.is_empty());
        }
    }

    fn payload_with_profile(edit: impl FnOnce(&mut serde_json::Value)) -> Vec<u8> {
        let mut profile = serde_json::to_value(ClientProfile::default()).unwrap();
        edit(&mut profile);
        serde_json::to_vec(&serde_json::json!({
            "request_id": "r9",
            "profile": profile,
        }))
        .unwrap()
    }

    #[test]
    fn test_unknown_category_is_validation_error() {
        let payload = payload_with_profile(|p| p["contact_method"] = "fax".into());
        let response = handler(true).handle_payload(&payload);

        assert_eq!(response.request_id, "r9");
        assert!(response.prediction.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.kind, "validation");
        assert!(error.message.contains("fax"));
    }

    #[test]
    fn test_undecodable_profile_values_are_validation_errors() {
        let edits: [fn(&mut serde_json::Value); 3] = [
            |p| p["age"] = 35.5f64.into(),
            |p| p["age"] = 4_000_000_000u64.into(),
            |p| {
                p.as_object_mut().unwrap().remove("household");
            },
        ];
        for edit in edits {
            let response = handler(true).handle_payload(&payload_with_profile(edit));
            assert_eq!(response.request_id, "r9");
            assert_eq!(response.error.unwrap().kind, "validation");
        }
    }

    #[test]
    fn test_payload_roundtrip() {
        let request = RetentionRequest::new(ClientProfile::default())
            .with_request_id("r2")
            .with_explanation();
        let payload = serde_json::to_vec(&request).unwrap();

        let response = handler(true).handle_payload(&payload);
        assert!(response.is_success());
        assert_eq!(response.request_id, "r2");
    }
}
