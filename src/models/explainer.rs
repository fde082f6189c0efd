//! SHAP explainers for the supported classifiers.
//!
//! Attributions are computed in margin (log-odds) space, so for every
//! instance `base_value + sum(shap_values) == raw_output`.
//!
//! - Linear models have the closed form `shap[i] = w[i] * (x[i] - mean[i])`.
//! - Tree ensembles use path-dependent TreeSHAP (Lundberg et al., 2018),
//!   which weights unseen branches by node cover.

use crate::error::ExplainabilityError;
use crate::models::classifier::{Classifier, LogisticModel, Node, Tree, TreeEnsemble};

/// Attribution algorithm bound to a classifier
pub enum Explainer<'a> {
    Linear(LinearExplainer<'a>),
    Tree(TreeExplainer<'a>),
}

impl<'a> Explainer<'a> {
    /// Build the explainer matching the classifier family.
    pub fn for_classifier(classifier: &'a Classifier) -> Result<Self, ExplainabilityError> {
        match classifier {
            Classifier::LogisticRegression(model) => {
                LinearExplainer::new(model).map(Explainer::Linear)
            }
            Classifier::GradientBoosting(model) => TreeExplainer::new(model).map(Explainer::Tree),
        }
    }

    /// Expected model output (log-odds)
    pub fn base_value(&self) -> f64 {
        match self {
            Explainer::Linear(explainer) => explainer.base_value(),
            Explainer::Tree(explainer) => explainer.base_value(),
        }
    }

    /// One SHAP value per feature
    pub fn shap_values(&self, features: &[f64]) -> Vec<f64> {
        match self {
            Explainer::Linear(explainer) => explainer.shap_values(features),
            Explainer::Tree(explainer) => explainer.shap_values(features),
        }
    }
}

/// Linear SHAP explainer for logistic regression.
pub struct LinearExplainer<'a> {
    model: &'a LogisticModel,
    /// Feature means for background
    feature_means: &'a [f64],
}

impl<'a> LinearExplainer<'a> {
    /// # Errors
    /// Returns `ExplainabilityError::MissingBackground` if the model carries
    /// no background means.
    pub fn new(model: &'a LogisticModel) -> Result<Self, ExplainabilityError> {
        let feature_means = model
            .background_means
            .as_deref()
            .filter(|means| means.len() == model.coefficients.len())
            .ok_or(ExplainabilityError::MissingBackground)?;
        Ok(Self {
            model,
            feature_means,
        })
    }

    /// `E[f(x)] = sum(w[i] * mean[i]) + bias`
    pub fn base_value(&self) -> f64 {
        self.model.margin(self.feature_means)
    }

    pub fn shap_values(&self, features: &[f64]) -> Vec<f64> {
        self.model
            .coefficients
            .iter()
            .zip(features.iter().zip(self.feature_means))
            .map(|(w, (x, mean))| w * (x - mean))
            .collect()
    }
}

/// TreeSHAP explainer for gradient-boosted trees.
pub struct TreeExplainer<'a> {
    ensemble: &'a TreeEnsemble,
    base_value: f64,
    max_depth: usize,
}

impl<'a> TreeExplainer<'a> {
    /// # Errors
    /// Returns `ExplainabilityError::MissingNodeStats` if any node lacks a
    /// positive cover.
    pub fn new(ensemble: &'a TreeEnsemble) -> Result<Self, ExplainabilityError> {
        if !ensemble.trees.iter().all(Tree::has_covers) {
            return Err(ExplainabilityError::MissingNodeStats(
                "positive cover statistics required on every node for TreeSHAP",
            ));
        }

        let base_value = ensemble.base_score
            + ensemble
                .trees
                .iter()
                .map(|tree| expected_value(tree, 0))
                .sum::<f64>();
        let max_depth = ensemble.trees.iter().map(Tree::depth).max().unwrap_or(1);

        Ok(Self {
            ensemble,
            base_value,
            max_depth,
        })
    }

    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    pub fn shap_values(&self, features: &[f64]) -> Vec<f64> {
        let mut phi = vec![0.0; features.len()];
        for tree in &self.ensemble.trees {
            let path = Vec::with_capacity(self.max_depth + 1);
            tree_shap(tree, features, &mut phi, 0, path, 1.0, 1.0, None);
        }
        phi
    }
}

/// Cover-weighted mean of the leaf values below `node`
fn expected_value(tree: &Tree, node: usize) -> f64 {
    match &tree.nodes[node] {
        Node::Leaf { value, .. } => *value,
        Node::Split { left, right, .. } => {
            let (left_cover, right_cover) = child_covers(tree, *left, *right);
            (left_cover * expected_value(tree, *left) + right_cover * expected_value(tree, *right))
                / (left_cover + right_cover)
        }
    }
}

/// Covers are checked in `TreeExplainer::new`.
fn child_covers(tree: &Tree, left: usize, right: usize) -> (f64, f64) {
    (
        tree.nodes[left].cover().unwrap_or(1.0),
        tree.nodes[right].cover().unwrap_or(1.0),
    )
}

/// One entry of the unique feature path from the root to the current node
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// `None` for the root sentinel
    feature: Option<usize>,
    /// Fraction of background flowing down this path when the feature is unknown
    zero_fraction: f64,
    /// Fraction of the sample flowing down this path when the feature is known
    one_fraction: f64,
    /// Permutation weight
    weight: f64,
}

#[allow(clippy::too_many_arguments)]
fn tree_shap(
    tree: &Tree,
    features: &[f64],
    phi: &mut [f64],
    node: usize,
    mut path: Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    extend_path(&mut path, zero_fraction, one_fraction, feature);

    match &tree.nodes[node] {
        Node::Leaf { value, .. } => {
            for i in 1..path.len() {
                let element = path[i];
                if let Some(f) = element.feature {
                    let weight = unwound_path_sum(&path, i);
                    phi[f] += weight * (element.one_fraction - element.zero_fraction) * value;
                }
            }
        }
        Node::Split {
            feature: split,
            threshold,
            left,
            right,
            ..
        } => {
            let (left_cover, right_cover) = child_covers(tree, *left, *right);
            let total_cover = left_cover + right_cover;
            let (hot, hot_cover, cold, cold_cover) = if features[*split] < *threshold {
                (*left, left_cover, *right, right_cover)
            } else {
                (*right, right_cover, *left, left_cover)
            };

            // A feature split on twice along the path must only be counted once
            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;
            let repeated = (1..path.len()).find(|&k| path[k].feature == Some(*split));
            if let Some(k) = repeated {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind_path(&mut path, k);
            }

            tree_shap(
                tree,
                features,
                phi,
                hot,
                path.clone(),
                incoming_zero * hot_cover / total_cover,
                incoming_one,
                Some(*split),
            );
            tree_shap(
                tree,
                features,
                phi,
                cold,
                path,
                incoming_zero * cold_cover / total_cover,
                0.0,
                Some(*split),
            );
        }
    }
}

fn extend_path(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let d = depth as f64;
    for i in (0..depth).rev() {
        let fi = i as f64;
        path[i + 1].weight += one_fraction * path[i].weight * (fi + 1.0) / (d + 1.0);
        path[i].weight = zero_fraction * path[i].weight * (d - fi) / (d + 1.0);
    }
}

fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].weight;

    let d = depth as f64;
    for i in (0..depth).rev() {
        let fi = i as f64;
        if one_fraction != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one_portion * (d + 1.0) / ((fi + 1.0) * one_fraction);
            next_one_portion = tmp - path[i].weight * zero_fraction * (d - fi) / (d + 1.0);
        } else {
            path[i].weight = path[i].weight * (d + 1.0) / (zero_fraction * (d - fi));
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with element `index` removed
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].weight;
    let mut total = 0.0;

    let d = depth as f64;
    if one_fraction != 0.0 {
        for i in (0..depth).rev() {
            let fi = i as f64;
            let tmp = next_one_portion / ((fi + 1.0) * one_fraction);
            total += tmp;
            next_one_portion = path[i].weight - tmp * zero_fraction * (d - fi);
        }
    } else {
        for i in (0..depth).rev() {
            total += path[i].weight / (zero_fraction * (d - i as f64));
        }
    }

    total * (d + 1.0)
}
