//! Gradient-boosted tree ensemble for binary:logistic objectives.
//!
//! Each tree is a flat node array rooted at index 0. A split sends a row to
//! `yes` when `row[feature] < threshold`, otherwise to `no`. The margin is the
//! logit of `base_score` plus one leaf value per tree.

use serde::{Deserialize, Serialize};

use super::{sigmoid, ModelLoadError};

/// A single node of a regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        yes: usize,
        no: usize,
    },
    Leaf {
        leaf: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    /// Walk from the root to a leaf.
    ///
    /// `validate` guarantees every child index is in range and strictly
    /// greater than its parent, so the walk terminates.
    fn leaf_value(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { leaf } => return *leaf,
                TreeNode::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                } => {
                    idx = if row[*feature] < *threshold { *yes } else { *no };
                }
            }
        }
    }

    fn validate(&self, tree_idx: usize, n_features: usize) -> Result<(), ModelLoadError> {
        if self.nodes.is_empty() {
            return Err(ModelLoadError::Structure(format!("tree {tree_idx} has no nodes")));
        }

        let n = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { leaf } if !leaf.is_finite() => {
                    return Err(ModelLoadError::Structure(format!(
                        "tree {tree_idx} node {i}: leaf value is not finite"
                    )));
                }
                TreeNode::Leaf { .. } => {}
                TreeNode::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                } => {
                    if *feature >= n_features {
                        return Err(ModelLoadError::Structure(format!(
                            "tree {tree_idx} node {i}: feature {feature} out of range (n_features={n_features})"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ModelLoadError::Structure(format!(
                            "tree {tree_idx} node {i}: threshold is not finite"
                        )));
                    }
                    for child in [*yes, *no] {
                        if child <= i || child >= n {
                            return Err(ModelLoadError::Structure(format!(
                                "tree {tree_idx} node {i}: child {child} must be in ({i}, {n})"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Boosted ensemble with a logistic link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    /// Prior probability of class 1 before any tree is applied.
    #[serde(default = "default_base_score")]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

fn default_base_score() -> f64 {
    0.5
}

impl TreeEnsemble {
    pub(crate) fn validate(&self, n_features: usize) -> Result<(), ModelLoadError> {
        if !(self.base_score > 0.0 && self.base_score < 1.0) {
            return Err(ModelLoadError::Structure(format!(
                "base_score {} must be in (0, 1)",
                self.base_score
            )));
        }
        if self.trees.is_empty() {
            return Err(ModelLoadError::Structure("ensemble has no trees".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i, n_features)?;
        }
        Ok(())
    }

    /// Raw margin (log-odds) for one row.
    #[must_use]
    pub fn margin(&self, row: &[f64]) -> f64 {
        let base = (self.base_score / (1.0 - self.base_score)).ln();
        base + self.trees.iter().map(|t| t.leaf_value(row)).sum::<f64>()
    }

    /// P(class 1) for one row.
    #[must_use]
    pub fn positive_probability(&self, row: &[f64]) -> f64 {
        sigmoid(self.margin(row))
    }
}
