//! ONNX Runtime backend

use crate::config::ModelBackend;
use crate::models::loader::LoadedModel;
use crate::models::predictor::Predictor;
use crate::reconcile::TabularRow;
use anyhow::{anyhow, bail, Context, Result};
use ort::value::Tensor;
use std::sync::Mutex;
use tracing::debug;

/// Predictor backed by an ONNX inference graph.
///
/// Expects numerically encoded features in training column order.
pub struct OnnxPredictor {
    name: String,
    /// Running a session needs exclusive access
    model: Mutex<LoadedModel>,
}

impl OnnxPredictor {
    pub fn new(model: LoadedModel) -> Self {
        Self {
            name: model.name.clone(),
            model: Mutex::new(model),
        }
    }
}

impl Predictor for OnnxPredictor {
    fn predict(&self, row: &TabularRow) -> Result<f64> {
        let features = row
            .to_f32_vec()
            .with_context(|| format!("Row is not valid input for model {}", self.name))?;

        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, features)).context("Failed to create input tensor")?;

        let mut model = self
            .model
            .lock()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        let LoadedModel {
            session,
            input_name,
            ..
        } = &mut *model;

        let outputs = session.run(ort::inputs![input_name.as_str() => input_tensor])?;

        let (name, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| anyhow!("Model {} produced no outputs", self.name))?;
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .with_context(|| format!("Output '{}' is not a float tensor", name))?;

        let dims: Vec<i64> = shape.iter().copied().collect();
        debug!(model = %self.name, output = %name, shape = ?dims, "ONNX inference complete");

        first_scalar(&dims, data)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> ModelBackend {
        ModelBackend::Onnx
    }
}

/// Leading element of an output tensor, i.e. `output[0][0]...[0]`
fn first_scalar(dims: &[i64], data: &[f32]) -> Result<f64> {
    if dims.iter().any(|&d| d == 0) {
        bail!("Output tensor has an empty dimension: {:?}", dims);
    }
    match data.first() {
        Some(&value) => Ok(value as f64),
        None => bail!("Output tensor is empty"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::loader::ModelLoader;
    use crate::reconcile::ColumnOrder;
    use crate::types::order::OrderRecord;
    use std::path::Path;

    /// Graph summing every element of `input: float[1, n]` into `output: float[1, 1]`
    const REDUCE_SUM: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/reduce_sum.onnx");

    fn reduce_sum() -> OnnxPredictor {
        let model = ModelLoader::default()
            .load_onnx(Path::new(REDUCE_SUM), "reduce_sum", "input")
            .unwrap();
        OnnxPredictor::new(model)
    }

    fn record() -> OrderRecord {
        OrderRecord::new()
            .with("Distance_km", 5.0)
            .with("Hour", 10_i64)
            .with("Preparation_Time_min", 15_i64)
    }

    #[test]
    fn test_predict_runs_session() {
        let model = reduce_sum();
        assert_eq!(model.name(), "reduce_sum");

        let value = model.predict(&TabularRow::from_record(&record())).unwrap();
        assert!((value - 30.0).abs() < 1e-6);

        // the session is reusable across requests
        let doubled = record()
            .with("Distance_km", 10.0)
            .with("Hour", 20_i64)
            .with("Preparation_Time_min", 30_i64);
        let value = model.predict(&TabularRow::from_record(&doubled)).unwrap();
        assert!((value - 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_predict_accepts_any_row_width() {
        let order = ColumnOrder::new(["Distance_km", "Preparation_Time_min"]);
        let row = TabularRow::from_record(&record()).reindex(&order);

        let value = reduce_sum().predict(&row).unwrap();
        assert!((value - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_undefined_cell_reaches_graph_as_nan() {
        let order = ColumnOrder::new(["Distance_km", "Weather", "Hour"]);
        let row = TabularRow::from_record(&record()).reindex(&order);

        assert!(reduce_sum().predict(&row).unwrap().is_nan());
    }

    #[test]
    fn test_categorical_cell_is_rejected_before_the_session() {
        let row = TabularRow::from_record(&record().with("Weather", "Rainy"));

        let err = reduce_sum().predict(&row).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("reduce_sum"));
        assert!(message.contains("Weather"));
    }

    #[test]
    fn test_first_scalar_unwraps_nested_output() {
        // [batch=1, targets=1]
        assert_eq!(first_scalar(&[1, 1], &[31.5]).unwrap(), 31.5);
        // [1, 1, 1]
        assert_eq!(first_scalar(&[1, 1, 1], &[12.25]).unwrap(), 12.25);
        // extra targets are ignored
        assert_eq!(first_scalar(&[1, 2], &[3.0, 4.0]).unwrap(), 3.0);
    }

    #[test]
    fn test_first_scalar_rejects_empty_output() {
        assert!(first_scalar(&[1, 0], &[]).is_err());
        assert!(first_scalar(&[], &[]).is_err());
    }
}
