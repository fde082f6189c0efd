//! Binary classifiers supported by the model artifact

use crate::error::ModelLoadError;
use serde::{Deserialize, Serialize};

/// Trained binary classifier operating on preprocessed features.
///
/// Both families produce a raw margin (log-odds) that is mapped to the
/// positive-class probability with the logistic sigmoid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    LogisticRegression(LogisticModel),
    GradientBoosting(TreeEnsemble),
}

impl Classifier {
    /// Classifier family name
    pub fn kind(&self) -> &'static str {
        match self {
            Classifier::LogisticRegression(_) => "logistic_regression",
            Classifier::GradientBoosting(_) => "gradient_boosting",
        }
    }

    /// Raw model output (log-odds) for a feature vector
    pub fn raw_output(&self, features: &[f64]) -> f64 {
        match self {
            Classifier::LogisticRegression(model) => model.margin(features),
            Classifier::GradientBoosting(model) => model.margin(features),
        }
    }

    /// Positive-class probability for a feature vector
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.raw_output(features))
    }

    /// Check that the classifier is consistent with the feature space.
    pub fn validate(&self, n_features: usize) -> Result<(), ModelLoadError> {
        match self {
            Classifier::LogisticRegression(model) => model.validate(n_features),
            Classifier::GradientBoosting(model) => model.validate(n_features),
        }
    }
}

/// Logistic regression: `sigmoid(w · x + b)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    /// One coefficient per feature
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// Mean of each feature over the training data, used as the
    /// attribution baseline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_means: Option<Vec<f64>>,
}

impl LogisticModel {
    pub fn margin(&self, features: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept
    }

    fn validate(&self, n_features: usize) -> Result<(), ModelLoadError> {
        if self.coefficients.len() != n_features {
            return Err(ModelLoadError::Incompatible(format!(
                "logistic regression has {} coefficients but the preprocessor produces {} features",
                self.coefficients.len(),
                n_features
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|w| !w.is_finite()) {
            return Err(ModelLoadError::Incompatible(
                "logistic regression parameters must be finite".to_string(),
            ));
        }
        if let Some(means) = &self.background_means {
            if means.len() != n_features {
                return Err(ModelLoadError::Incompatible(format!(
                    "background_means has {} entries, expected {}",
                    means.len(),
                    n_features
                )));
            }
        }
        Ok(())
    }
}

/// Gradient-boosted decision trees with a binary logistic objective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    /// Initial margin added to the sum of tree outputs
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn margin(&self, features: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|tree| tree.predict(features)).sum::<f64>()
    }

    fn validate(&self, n_features: usize) -> Result<(), ModelLoadError> {
        if self.trees.is_empty() {
            return Err(ModelLoadError::Incompatible(
                "gradient boosting model has no trees".to_string(),
            ));
        }
        if !self.base_score.is_finite() {
            return Err(ModelLoadError::Incompatible(
                "base_score must be finite".to_string(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features)
                .map_err(|msg| ModelLoadError::Incompatible(format!("tree {}: {}", i, msg)))?;
        }
        Ok(())
    }
}

/// A single regression tree stored as a flat node array rooted at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

/// Tree node.
///
/// `cover` is the training weight that reached the node; it is only needed
/// for attributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Samples with `x[feature] < threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cover: Option<f64>,
    },
    Leaf {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cover: Option<f64>,
    },
}

impl Node {
    pub fn cover(&self) -> Option<f64> {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

impl Tree {
    /// Leaf value reached by a feature vector
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    index = if features[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Whether every node carries a positive cover
    pub fn has_covers(&self) -> bool {
        self.nodes
            .iter()
            .all(|node| matches!(node.cover(), Some(c) if c > 0.0 && c.is_finite()))
    }

    pub fn depth(&self) -> usize {
        self.depth_from(0)
    }

    fn depth_from(&self, index: usize) -> usize {
        match &self.nodes[index] {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => {
                1 + self.depth_from(*left).max(self.depth_from(*right))
            }
        }
    }

    /// Children must point strictly forward and have a single parent, which
    /// keeps the nodes a proper tree.
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let mut has_parent = vec![false; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {} splits on feature {} but only {} features exist",
                            i, feature, n_features
                        ));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {} has a NaN threshold", i));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", i, child));
                        }
                        if has_parent[child] {
                            return Err(format!("node {} shares child {}", i, child));
                        }
                        has_parent[child] = true;
                    }
                }
                Node::Leaf { value, .. } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {} has a non-finite value", i));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Numerically stable logistic sigmoid.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
