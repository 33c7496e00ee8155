//! Native tree-ensemble checkpoint backend

use crate::config::ModelBackend;
use crate::models::loader::read_artifact;
use crate::models::predictor::{first_prediction, Predictor};
use crate::reconcile::TabularRow;
use crate::types::order::FieldValue;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// A node of a regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    /// Goes left when the category is in `categories`; undefined goes right
    Categorical {
        feature: usize,
        categories: Vec<String>,
        left: usize,
        right: usize,
    },
    /// Goes left when `value < threshold`; undefined follows `default_left`
    Numeric {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default)]
        default_left: bool,
    },
    Leaf {
        leaf: f64,
    },
}

impl Node {
    fn children(&self) -> Option<(usize, usize)> {
        match self {
            Node::Categorical { left, right, .. } | Node::Numeric { left, right, .. } => {
                Some((*left, *right))
            }
            Node::Leaf { .. } => None,
        }
    }

    fn feature(&self) -> Option<usize> {
        match self {
            Node::Categorical { feature, .. } | Node::Numeric { feature, .. } => Some(*feature),
            Node::Leaf { .. } => None,
        }
    }
}

/// A single regression tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    fn evaluate(&self, row: &TabularRow, feature_names: &[String]) -> Result<f64> {
        let mut idx = 0;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..self.nodes.len() {
            let Some(node) = self.nodes.get(idx) else {
                bail!("Tree node {} does not exist ({} nodes)", idx, self.nodes.len());
            };
            let feature = match node.feature() {
                Some(feature) => match feature_names.get(feature) {
                    Some(name) => name.as_str(),
                    None => bail!(
                        "Node {} uses feature {} of {}",
                        idx,
                        feature,
                        feature_names.len()
                    ),
                },
                None => "",
            };

            idx = match node {
                Node::Leaf { leaf } => return Ok(*leaf),
                Node::Numeric {
                    feature: position,
                    threshold,
                    left,
                    right,
                    default_left,
                } => match row.cell(*position) {
                    Some(FieldValue::Number(value)) if *value < *threshold => *left,
                    Some(FieldValue::Number(_)) => *right,
                    Some(FieldValue::Category(value)) => {
                        bail!("Feature {} expects a number, got '{}'", feature, value)
                    }
                    None if *default_left => *left,
                    None => *right,
                },
                Node::Categorical {
                    feature: position,
                    categories,
                    left,
                    right,
                } => match row.cell(*position) {
                    Some(FieldValue::Category(value)) if categories.contains(value) => *left,
                    Some(FieldValue::Category(_)) | None => *right,
                    Some(FieldValue::Number(value)) => {
                        bail!("Feature {} expects a category, got {}", feature, value)
                    }
                },
            };
        }
        bail!("Tree traversal did not reach a leaf")
    }
}

/// Gradient-boosted tree ensemble checkpoint.
///
/// Features are read by position and must arrive in `feature_names` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsemble {
    #[serde(skip)]
    name: String,
    #[serde(default)]
    pub base_score: f64,
    pub feature_names: Vec<String>,
    pub trees: Vec<Tree>,
}

impl TreeEnsemble {
    /// Load and validate a JSON checkpoint
    pub fn load<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let path = path.as_ref();
        let mut ensemble: TreeEnsemble = read_artifact(path)
            .with_context(|| format!("Failed to load checkpoint {}", name))?;
        ensemble.name = name.to_string();
        ensemble.validate()?;

        info!(
            model = %name,
            trees = ensemble.trees.len(),
            features = ensemble.feature_names.len(),
            "Checkpoint loaded"
        );
        Ok(ensemble)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Check node references and feature indices
    pub fn validate(&self) -> Result<()> {
        let n_features = self.feature_names.len();
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                bail!("Tree {} has no nodes", t);
            }
            for (n, node) in tree.nodes.iter().enumerate() {
                if let Some(feature) = node.feature() {
                    if feature >= n_features {
                        bail!(
                            "Tree {} node {} uses feature {} of {}",
                            t,
                            n,
                            feature,
                            n_features
                        );
                    }
                }
                if let Some((left, right)) = node.children() {
                    if left >= tree.nodes.len() || right >= tree.nodes.len() {
                        bail!("Tree {} node {} points outside the tree", t, n);
                    }
                }
            }
        }
        Ok(())
    }

    /// Prediction sequence for a single row
    pub fn predict_sequence(&self, row: &TabularRow) -> Result<Vec<f64>> {
        if row.columns() != self.feature_names.as_slice() {
            bail!(
                "Shape mismatch: model {} expects columns {:?}, got {:?}",
                self.name,
                self.feature_names,
                row.columns()
            );
        }

        let mut total = self.base_score;
        for tree in &self.trees {
            total += tree.evaluate(row, &self.feature_names)?;
        }
        Ok(vec![total])
    }
}

impl Predictor for TreeEnsemble {
    fn predict(&self, row: &TabularRow) -> Result<f64> {
        first_prediction(&self.predict_sequence(row)?)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> ModelBackend {
        ModelBackend::Checkpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::ColumnOrder;
    use crate::types::order::OrderRecord;
    use std::io::Write;

    const CHECKPOINT: &str = r#"{
        "base_score": 20.0,
        "feature_names": ["Distance_km", "Weather", "Preparation_Time_min"],
        "trees": [
            {"nodes": [
                {"feature": 0, "threshold": 10.0, "left": 1, "right": 2, "default_left": true},
                {"leaf": 5.0},
                {"leaf": 15.0}
            ]},
            {"nodes": [
                {"feature": 1, "categories": ["Rainy"], "left": 1, "right": 2},
                {"leaf": 8.0},
                {"feature": 2, "threshold": 30.0, "left": 3, "right": 4},
                {"leaf": 1.0},
                {"leaf": 4.0}
            ]}
        ]
    }"#;

    fn ensemble() -> TreeEnsemble {
        serde_json::from_str::<TreeEnsemble>(CHECKPOINT)
            .unwrap()
            .with_name("trees")
    }

    fn order() -> ColumnOrder {
        ColumnOrder::new(["Distance_km", "Weather", "Preparation_Time_min"])
    }

    fn row(record: &OrderRecord) -> TabularRow {
        TabularRow::from_record(record).reindex(&order())
    }

    #[test]
    fn test_node_kinds_parse() {
        let model = ensemble();
        assert!(matches!(model.trees[0].nodes[0], Node::Numeric { .. }));
        assert!(matches!(model.trees[1].nodes[0], Node::Categorical { .. }));
        assert!(matches!(model.trees[1].nodes[1], Node::Leaf { .. }));
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_predict_sums_trees() {
        let record = OrderRecord::new()
            .with("Distance_km", 5.0)
            .with("Weather", "Rainy")
            .with("Preparation_Time_min", 15_i64);
        // 20 + 5 + 8
        assert_eq!(ensemble().predict(&row(&record)).unwrap(), 33.0);

        let record = OrderRecord::new()
            .with("Distance_km", 12.0)
            .with("Weather", "Clear")
            .with("Preparation_Time_min", 45_i64);
        // 20 + 15 + 4
        assert_eq!(ensemble().predict(&row(&record)).unwrap(), 39.0);
    }

    #[test]
    fn test_undefined_values_follow_defaults() {
        let record = OrderRecord::new().with("Preparation_Time_min", 10_i64);
        // distance undefined goes left (5), weather undefined goes right, prep < 30 (1)
        assert_eq!(ensemble().predict(&row(&record)).unwrap(), 26.0);
    }

    #[test]
    fn test_column_mismatch_is_an_error() {
        let record = OrderRecord::new()
            .with("Weather", "Rainy")
            .with("Distance_km", 5.0)
            .with("Preparation_Time_min", 15_i64);
        let unordered = TabularRow::from_record(&record);

        let err = ensemble().predict(&unordered).unwrap_err();
        assert!(err.to_string().contains("Shape mismatch"));
    }

    #[test]
    fn test_validate_rejects_dangling_children() {
        let mut model = ensemble();
        model.trees[0].nodes[0] = Node::Numeric {
            feature: 0,
            threshold: 1.0,
            left: 1,
            right: 9,
            default_left: false,
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_feature() {
        let mut model = ensemble();
        model.trees[1].nodes[0] = Node::Categorical {
            feature: 7,
            categories: vec!["Rainy".to_string()],
            left: 1,
            right: 2,
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_cyclic_tree_does_not_loop() {
        let mut model = ensemble();
        model.trees[0].nodes[0] = Node::Numeric {
            feature: 0,
            threshold: 100.0,
            left: 0,
            right: 0,
            default_left: false,
        };
        let record = OrderRecord::new()
            .with("Distance_km", 1.0)
            .with("Weather", "Clear")
            .with("Preparation_Time_min", 5_i64);
        assert!(model.predict(&row(&record)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{}", CHECKPOINT).unwrap();

        let model = TreeEnsemble::load(file.path(), "delivery_gbm").unwrap();
        assert_eq!(model.name(), "delivery_gbm");
        assert_eq!(model.backend(), ModelBackend::Checkpoint);
        assert_eq!(model.trees.len(), 2);
    }

    fn complete_row() -> TabularRow {
        let record = OrderRecord::new()
            .with("Distance_km", 12.0)
            .with("Weather", "Clear")
            .with("Preparation_Time_min", 5_i64);
        row(&record)
    }

    #[test]
    fn test_unvalidated_dangling_child_is_an_error() {
        // deserialized directly, so `load`'s validation never ran
        let model: TreeEnsemble = serde_json::from_str(
            r#"{"feature_names": ["Distance_km", "Weather", "Preparation_Time_min"],
                "trees": [{"nodes": [
                    {"feature": 0, "threshold": 10.0, "left": 1, "right": 9},
                    {"leaf": 5.0}
                ]}]}"#,
        )
        .unwrap();
        assert!(model.validate().is_err());

        let err = model.predict(&complete_row()).unwrap_err();
        assert!(err.to_string().contains("node 9"));
    }

    #[test]
    fn test_unvalidated_unknown_feature_is_an_error() {
        let mut model = ensemble();
        model.trees[0].nodes[0] = Node::Numeric {
            feature: 7,
            threshold: 10.0,
            left: 1,
            right: 2,
            default_left: true,
        };

        let err = model.predict(&complete_row()).unwrap_err();
        assert!(err.to_string().contains("feature 7"));
    }
}
