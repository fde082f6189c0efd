//! Request and response messages exchanged over NATS

use crate::error::ServiceError;
use crate::types::prediction::{AttributionResult, PredictionResult};
use crate::types::profile::ClientProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prediction request for a single client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionRequest {
    /// Caller-supplied correlation id; generated when absent
    #[serde(default)]
    pub request_id: Option<String>,

    /// Client profile to score
    pub profile: ClientProfile,

    /// Whether to compute feature attributions
    #[serde(default)]
    pub explain: bool,
}

impl RetentionRequest {
    pub fn new(profile: ClientProfile) -> Self {
        Self {
            request_id: None,
            profile,
            explain: false,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_explanation(mut self) -> Self {
        self.explain = true;
        self
    }
}

/// Error reported back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl From<&ServiceError> for ErrorBody {
    fn from(err: &ServiceError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Reply to a [`RetentionRequest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionResponse {
    /// Correlation id of the request
    pub request_id: String,

    /// Name of the model artifact that produced the result
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributions: Option<AttributionResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,

    /// Response generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl RetentionResponse {
    /// Successful response
    pub fn success(request_id: String, model: &str, prediction: PredictionResult) -> Self {
        Self {
            request_id,
            model: model.to_string(),
            prediction: Some(prediction),
            attributions: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Failed response
    pub fn failure(request_id: String, model: &str, error: &ServiceError) -> Self {
        Self {
            request_id,
            model: model.to_string(),
            prediction: None,
            attributions: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    /// Attach feature attributions
    pub fn with_attributions(mut self, attributions: AttributionResult) -> Self {
        self.attributions = Some(attributions);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Resolve the correlation id for a request, generating one when absent
pub fn resolve_request_id(request_id: Option<String>) -> String {
    request_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_request_defaults() {
        let json = serde_json::json!({ "profile": ClientProfile::default() });
        let request: RetentionRequest = serde_json::from_value(json).unwrap();
        assert!(request.request_id.is_none());
        assert!(!request.explain);
        assert_eq!(request.profile, ClientProfile::default());
    }

    #[test]
    fn test_request_builder_roundtrip() {
        let request = RetentionRequest::new(ClientProfile::default())
            .with_request_id("req_1")
            .with_explanation();

        let json = serde_json::to_string(&request).unwrap();
        let decoded: RetentionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.request_id.as_deref(), Some("req_1"));
        assert!(decoded.explain);
    }

    #[test]
    fn test_failure_response_serialization() {
        let err = ServiceError::from(ValidationError::OutOfRange {
            field: "age",
            min: 18.0,
            max: 100.0,
            value: 101.0,
        });
        let response = RetentionResponse::failure("req_2".to_string(), "client_retention", &err);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"]["kind"], "validation");
        assert!(json.get("prediction").is_none());
        assert!(!response.is_success());
    }

    #[test]
    fn test_success_response() {
        let response = RetentionResponse::success(
            "req_3".to_string(),
            "client_retention",
            PredictionResult::from_probability(0.8),
        );
        let json = serde_json::to_string(&response).unwrap();
        let decoded: RetentionResponse = serde_json::from_str(&json).unwrap();
        assert!(decoded.is_success());
        assert_eq!(decoded.prediction.map(|p| p.label), Some(1));
    }

    #[test]
    fn test_resolve_request_id() {
        assert_eq!(resolve_request_id(Some("abc".to_string())), "abc");
        let generated = resolve_request_id(None);
        assert!(uuid::Uuid::parse_str(&generated).is_ok());
        assert_ne!(resolve_request_id(Some(String::new())), "");
    }
}
