//! Common interface over the serialized model backends

use crate::config::ModelBackend;
use crate::reconcile::TabularRow;
use anyhow::{bail, Result};

/// A loaded regression model producing delivery time in minutes.
///
/// Implementations are immutable after loading and shared by every request.
pub trait Predictor: Send + Sync {
    /// Predict a single value for a single-row table
    fn predict(&self, row: &TabularRow) -> Result<f64>;

    /// Model name, for logs and responses
    fn name(&self) -> &str;

    /// Serialized format the model was loaded from
    fn backend(&self) -> ModelBackend;
}

/// First element of a prediction sequence
pub fn first_prediction(predictions: &[f64]) -> Result<f64> {
    match predictions.first() {
        Some(value) => Ok(*value),
        None => bail!("Model returned an empty prediction sequence"),
    }
}
