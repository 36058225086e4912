//! Tree ensemble regressor
//!
//! Each tree is a flat node array with node 0 as the root. Traversal goes left
//! when `feature <= threshold`. The ensemble score is
//! `bias + sum(leaf * tree.weight)`, so a random forest export stores
//! `weight = 1 / n_trees` and a boosted export stores the learning rate.

use crate::errors::{PredictorError, Result};
use crate::features::FEATURE_COUNT;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported forest format version
pub const FOREST_FORMAT_VERSION: u32 = 1;

/// A decision tree node (internal or leaf)
///
/// Leaves carry `leaf = Some(value)` and `feature_idx == -1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Left child index (-1 for leaf nodes)
    pub left: i32,
    /// Right child index (-1 for leaf nodes)
    pub right: i32,
    /// Feature index to split on (-1 for leaf nodes)
    #[serde(alias = "feature")]
    pub feature_idx: i32,
    /// Split threshold
    pub threshold: f64,
    /// Leaf value
    pub leaf: Option<f64>,
}

impl Node {
    pub fn internal(feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    pub fn leaf(value: f64) -> Self {
        Self {
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    pub nodes: Vec<Node>,
    pub weight: f64,
}

impl Tree {
    pub fn new(nodes: Vec<Node>, weight: f64) -> Self {
        Self { nodes, weight }
    }

    /// Leaf value reached by `features`; malformed paths yield 0.0
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        // A valid tree reaches a leaf in at most nodes.len() steps.
        for _ in 0..=self.nodes.len() {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };
            if node.is_leaf() {
                return node.leaf.unwrap_or(0.0);
            }
            let Some(&value) = features.get(node.feature_idx as usize) else {
                return 0.0;
            };
            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };
            if next < 0 {
                return 0.0;
            }
            idx = next as usize;
        }
        0.0
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        if !self.weight.is_finite() {
            return Err(format!("Tree weight {} is not finite", self.weight));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                match node.leaf {
                    Some(value) if value.is_finite() => {}
                    Some(value) => {
                        return Err(format!("Leaf node {i} has non-finite value {value}"))
                    }
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                }
                continue;
            }
            for (side, child) in [("left", node.left), ("right", node.right)] {
                if child < 0 || child as usize >= self.nodes.len() || child as usize == i {
                    return Err(format!("Node {i} has invalid {side} child: {child}"));
                }
            }
            if node.feature_idx < 0 || node.feature_idx as usize >= FEATURE_COUNT {
                return Err(format!(
                    "Internal node {i} has invalid feature index: {}",
                    node.feature_idx
                ));
            }
            if !node.threshold.is_finite() {
                return Err(format!("Internal node {i} has non-finite threshold"));
            }
        }
        Ok(())
    }
}

/// Fitted tree ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Forest {
    pub version: u32,
    pub trees: Vec<Tree>,
    #[serde(default)]
    pub bias: f64,
}

impl Forest {
    pub fn new(trees: Vec<Tree>, bias: f64) -> Self {
        Self {
            version: FOREST_FORMAT_VERSION,
            trees,
            bias,
        }
    }

    /// Average of equally weighted trees, the usual random forest export
    pub fn averaged(trees: Vec<Vec<Node>>) -> Self {
        let weight = if trees.is_empty() {
            0.0
        } else {
            1.0 / trees.len() as f64
        };
        Self::new(
            trees.into_iter().map(|nodes| Tree::new(nodes, weight)).collect(),
            0.0,
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != FOREST_FORMAT_VERSION {
            return Err(PredictorError::InvalidArtifact(format!(
                "Unsupported forest version: {}",
                self.version
            )));
        }
        if self.trees.is_empty() {
            return Err(PredictorError::InvalidArtifact(
                "Forest must have at least one tree".to_string(),
            ));
        }
        if !self.bias.is_finite() {
            return Err(PredictorError::InvalidArtifact(
                "Forest bias is not finite".to_string(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| {
                PredictorError::InvalidArtifact(format!("Tree {i} validation failed: {e}"))
            })?;
        }
        Ok(())
    }

    pub fn score(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.bias, |sum, tree| sum + tree.evaluate(features) * tree.weight)
    }

    /// Blake3 hash of the compact JSON encoding, hex encoded
    pub fn hash_hex(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let forest: Forest = serde_json::from_str(&json)?;
        forest.validate()?;
        Ok(forest)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, serde_json::to_vec(self)?)?;
        Ok(())
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}
