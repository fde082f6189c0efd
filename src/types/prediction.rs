//! Prediction and attribution results

use crate::types::profile::ProfileField;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Probability at or above which a client is labelled as likely to return
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Retention outcome for a predicted label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    LikelyToReturn,
    MayNotReturn,
}

/// Classification decision for a single client profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// 1 when the client is likely to return, 0 otherwise
    pub label: u8,
    /// Probability of the positive class (0.0 - 1.0)
    pub probability: f64,
}

impl PredictionResult {
    /// Apply the fixed decision threshold to a positive-class probability
    pub fn from_probability(probability: f64) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        Self {
            label: u8::from(probability >= DECISION_THRESHOLD),
            probability,
        }
    }

    pub fn outcome(&self) -> Outcome {
        if self.label == 1 {
            Outcome::LikelyToReturn
        } else {
            Outcome::MayNotReturn
        }
    }
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome() {
            Outcome::LikelyToReturn => write!(
                f,
                "Client is likely to return (probability {:.2})",
                self.probability
            ),
            Outcome::MayNotReturn => write!(
                f,
                "Client may not return (probability {:.2})",
                self.probability
            ),
        }
    }
}

/// Whether a feature pushes the prediction towards or away from returning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increases,
    Decreases,
}

impl Direction {
    /// Negative contributions decrease the outcome; zero counts as increasing.
    pub fn from_contribution(contribution: f64) -> Self {
        if contribution < 0.0 {
            Direction::Decreases
        } else {
            Direction::Increases
        }
    }
}

/// Signed contribution of one feature to the model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttribution {
    /// Human-readable feature name, e.g. `age` or `contact_method=phone`
    pub feature_name: String,
    /// Profile column the feature was derived from
    pub field: ProfileField,
    /// Contribution in log-odds
    pub contribution: f64,
    pub direction: Direction,
}

impl FeatureAttribution {
    pub fn new(feature_name: impl Into<String>, field: ProfileField, contribution: f64) -> Self {
        Self {
            feature_name: feature_name.into(),
            field,
            contribution,
            direction: Direction::from_contribution(contribution),
        }
    }
}

/// Ranked feature attributions for a single client profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    /// Expected model output over the background distribution (log-odds)
    pub base_value: f64,
    /// Model output for this profile (log-odds)
    pub output_value: f64,
    /// Attributions ranked by absolute contribution, largest first
    pub attributions: Vec<FeatureAttribution>,
}

impl AttributionResult {
    /// Build a ranked result from per-feature contributions.
    ///
    /// `features` pairs each transformed feature's name with its source column
    /// and must be in the same order as `contributions`.
    pub fn from_contributions(
        features: &[(String, ProfileField)],
        contributions: &[f64],
        base_value: f64,
        output_value: f64,
    ) -> Self {
        let mut attributions: Vec<FeatureAttribution> = features
            .iter()
            .zip(contributions)
            .map(|((name, field), &value)| FeatureAttribution::new(name.clone(), *field, value))
            .collect();
        rank(&mut attributions);

        Self {
            base_value,
            output_value,
            attributions,
        }
    }

    /// Sum of all contributions
    pub fn total_contribution(&self) -> f64 {
        self.attributions.iter().map(|a| a.contribution).sum()
    }

    /// The `k` largest attributions
    pub fn top(&self, k: usize) -> &[FeatureAttribution] {
        &self.attributions[..k.min(self.attributions.len())]
    }

    /// Keep only the `k` largest attributions
    pub fn truncate(&mut self, k: usize) {
        self.attributions.truncate(k);
    }

    /// Contributions summed per profile column, ranked the same way.
    ///
    /// Collapses one-hot indicator features back onto the column they encode.
    pub fn by_field(&self) -> Vec<FeatureAttribution> {
        let mut order: Vec<ProfileField> = Vec::new();
        let mut sums: HashMap<ProfileField, f64> = HashMap::new();

        for attribution in &self.attributions {
            let sum = sums.entry(attribution.field).or_insert_with(|| {
                order.push(attribution.field);
                0.0
            });
            *sum += attribution.contribution;
        }

        let mut fields: Vec<FeatureAttribution> = order
            .into_iter()
            .map(|field| FeatureAttribution::new(field.name(), field, sums[&field]))
            .collect();
        rank(&mut fields);
        fields
    }
}

/// Stable sort by absolute contribution, descending
fn rank(attributions: &mut [FeatureAttribution]) {
    attributions.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
}
