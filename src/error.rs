//! Error taxonomy for the retention service

use std::path::PathBuf;
use thiserror::Error;

/// A client profile (or request) violates the input domain
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    /// A profile field is missing, mistyped or outside its category set
    #[error("Invalid client profile: {0}")]
    InvalidProfile(String),

    #[error("Malformed request: {0}")]
    Malformed(String),
}

/// The serialized model artifact is missing, corrupt or incompatible
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported artifact format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Incompatible model artifact: {0}")]
    Incompatible(String),
}

/// The attribution algorithm cannot be constructed for the loaded classifier
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExplainabilityError {
    #[error("Linear attribution requires background feature means")]
    MissingBackground,

    #[error("Missing node statistics: {0}")]
    MissingNodeStats(&'static str),
}

/// Any failure a prediction or explanation call can report
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),

    #[error(transparent)]
    Explainability(#[from] ExplainabilityError),
}

impl ServiceError {
    /// Short machine-readable kind used in responses and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(ValidationError::Malformed(_)) => "malformed",
            ServiceError::Validation(_) => "validation",
            ServiceError::ModelLoad(_) => "model_load",
            ServiceError::Explainability(_) => "explainability",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err: ServiceError = ValidationError::NotFinite { field: "distance_km" }.into();
        assert_eq!(err.kind(), "validation");

        let err: ServiceError =
            ValidationError::InvalidProfile("unknown variant `fax`".to_string()).into();
        assert_eq!(err.kind(), "validation");

        let err: ServiceError = ValidationError::Malformed("eof".to_string()).into();
        assert_eq!(err.kind(), "malformed");

        let err: ServiceError = ExplainabilityError::MissingBackground.into();
        assert_eq!(err.kind(), "explainability");
    }

    #[test]
    fn test_out_of_range_message() {
        let err = ValidationError::OutOfRange {
            field: "age",
            min: 18.0,
            max: 100.0,
            value: 17.0,
        };
        assert_eq!(err.to_string(), "age must be between 18 and 100, got 17");
    }
}
