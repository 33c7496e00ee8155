//! Pickled linear estimator backend

use crate::config::ModelBackend;
use crate::models::loader::read_artifact;
use crate::models::predictor::{first_prediction, Predictor};
use crate::reconcile::TabularRow;
use crate::types::order::FieldValue;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Linear regression exported as a pickled mapping.
///
/// Numeric features carry one weight each. Categorical features carry one
/// weight per non-baseline level; levels not listed contribute nothing.
/// Features are looked up by column name, so row order does not matter.
/// Terms are summed in column-name order, which fixes the float rounding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearEstimator {
    #[serde(skip)]
    name: String,
    pub intercept: f64,
    #[serde(default)]
    pub coefficients: BTreeMap<String, f64>,
    #[serde(default)]
    pub categories: BTreeMap<String, BTreeMap<String, f64>>,
}

impl LinearEstimator {
    /// Load a pickled estimator
    pub fn load<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let path = path.as_ref();
        let mut estimator: LinearEstimator = read_artifact(path)
            .with_context(|| format!("Failed to load pickled estimator {}", name))?;
        estimator.name = name.to_string();

        info!(
            model = %name,
            numeric = estimator.coefficients.len(),
            categorical = estimator.categories.len(),
            "Pickled estimator loaded"
        );
        Ok(estimator)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Prediction sequence for a single row
    pub fn predict_sequence(&self, row: &TabularRow) -> Result<Vec<f64>> {
        let mut total = self.intercept;

        for (column, weight) in &self.coefficients {
            match row.value(column) {
                Some(FieldValue::Number(value)) => total += weight * value,
                Some(FieldValue::Category(value)) => {
                    bail!("Feature {} expects a number, got '{}'", column, value)
                }
                None => bail!("Feature {} is missing", column),
            }
        }

        for (column, levels) in &self.categories {
            match row.value(column) {
                Some(FieldValue::Category(level)) => {
                    total += levels.get(level).copied().unwrap_or(0.0);
                }
                Some(FieldValue::Number(value)) => {
                    bail!("Feature {} expects a category, got {}", column, value)
                }
                None => bail!("Feature {} is missing", column),
            }
        }

        Ok(vec![total])
    }
}

impl Predictor for LinearEstimator {
    fn predict(&self, row: &TabularRow) -> Result<f64> {
        first_prediction(&self.predict_sequence(row)?)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> ModelBackend {
        ModelBackend::Pickle
    }
}
