//! Feature extraction for retention model inference.
//!
//! Applies the preprocessing transform shipped with the model artifact,
//! turning a client profile into the numeric feature vector the classifier
//! was trained on.

use crate::error::ModelLoadError;
use crate::types::profile::{ClientProfile, FieldValue, ProfileField};
use serde::{Deserialize, Serialize};

/// One step of the preprocessing transform.
///
/// Steps are applied in order and their outputs concatenated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnTransform {
    /// Standard scaling of a numeric column: `(x - mean) / scale`
    Scale {
        field: ProfileField,
        mean: f64,
        scale: f64,
    },
    /// Numeric column used as-is
    Passthrough { field: ProfileField },
    /// One indicator per category; values not listed encode as all zeros
    OneHot {
        field: ProfileField,
        categories: Vec<String>,
    },
}

impl ColumnTransform {
    /// Profile column this step reads
    pub fn field(&self) -> ProfileField {
        match self {
            ColumnTransform::Scale { field, .. }
            | ColumnTransform::Passthrough { field }
            | ColumnTransform::OneHot { field, .. } => *field,
        }
    }

    /// Number of features this step produces
    pub fn width(&self) -> usize {
        match self {
            ColumnTransform::OneHot { categories, .. } => categories.len(),
            _ => 1,
        }
    }

    fn validate(&self) -> Result<(), ModelLoadError> {
        let field = self.field();
        match self {
            ColumnTransform::Scale { mean, scale, .. } => {
                ensure_numeric(field)?;
                if !mean.is_finite() || !scale.is_finite() || *scale == 0.0 {
                    return Err(ModelLoadError::Incompatible(format!(
                        "invalid scaling for {}: mean={}, scale={}",
                        field, mean, scale
                    )));
                }
            }
            ColumnTransform::Passthrough { .. } => ensure_numeric(field)?,
            ColumnTransform::OneHot { categories, .. } => {
                let domain = field.categories().ok_or_else(|| {
                    ModelLoadError::Incompatible(format!(
                        "one-hot encoding applied to numeric field {}",
                        field
                    ))
                })?;
                if categories.is_empty() {
                    return Err(ModelLoadError::Incompatible(format!(
                        "one-hot encoding of {} has no categories",
                        field
                    )));
                }
                for (i, category) in categories.iter().enumerate() {
                    if !domain.contains(&category.as_str()) {
                        return Err(ModelLoadError::Incompatible(format!(
                            "unknown category {:?} for {}",
                            category, field
                        )));
                    }
                    if categories[..i].contains(category) {
                        return Err(ModelLoadError::Incompatible(format!(
                            "duplicate category {:?} for {}",
                            category, field
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn ensure_numeric(field: ProfileField) -> Result<(), ModelLoadError> {
    if field.is_categorical() {
        Err(ModelLoadError::Incompatible(format!(
            "numeric transform applied to categorical field {}",
            field
        )))
    } else {
        Ok(())
    }
}

/// Feature extractor that transforms client profiles into model input features.
///
/// Features are produced in the exact order expected by the classifier.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    columns: Vec<ColumnTransform>,
    /// Output feature names paired with the column they derive from
    features: Vec<(String, ProfileField)>,
}

impl FeatureExtractor {
    /// Create a feature extractor from an ordered list of column transforms.
    pub fn new(columns: Vec<ColumnTransform>) -> Result<Self, ModelLoadError> {
        if columns.is_empty() {
            return Err(ModelLoadError::Incompatible(
                "preprocessor has no columns".to_string(),
            ));
        }

        let mut features = Vec::new();
        for column in &columns {
            column.validate()?;
            let field = column.field();
            match column {
                ColumnTransform::OneHot { categories, .. } => {
                    for category in categories {
                        features.push((format!("{}={}", field, category), field));
                    }
                }
                _ => features.push((field.name().to_string(), field)),
            }
        }

        Ok(Self { columns, features })
    }

    /// Extract the feature vector for a profile.
    pub fn extract(&self, profile: &ClientProfile) -> Vec<f64> {
        let mut features = Vec::with_capacity(self.features.len());

        for column in &self.columns {
            match (column, profile.value(column.field())) {
                (ColumnTransform::Scale { mean, scale, .. }, FieldValue::Number(x)) => {
                    features.push((x - mean) / scale);
                }
                (ColumnTransform::Passthrough { .. }, FieldValue::Number(x)) => {
                    features.push(x);
                }
                (ColumnTransform::OneHot { categories, .. }, FieldValue::Category(value)) => {
                    features.extend(
                        categories
                            .iter()
                            .map(|category| if category == value { 1.0 } else { 0.0 }),
                    );
                }
                // Field kinds are checked in `new`
                (column, _) => features.extend(std::iter::repeat(f64::NAN).take(column.width())),
            }
        }

        features
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Get feature names in output order.
    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Feature names paired with their source columns.
    pub fn features(&self) -> &[(String, ProfileField)] {
        &self.features
    }

    pub fn columns(&self) -> &[ColumnTransform] {
        &self.columns
    }
}
