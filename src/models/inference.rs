//! Inference adapter: record assembly, column reconciliation, model
//! invocation and interval estimation.

use crate::config::AppConfig;
use crate::interval::{ConfidenceInterval, ResidualSource};
use crate::models::loader::ModelLoader;
use crate::models::predictor::Predictor;
use crate::reconcile::{ColumnOrder, TabularRow};
use crate::types::order::OrderRecord;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of model inference
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    /// Predicted delivery time in minutes
    pub point_estimate: f64,
    /// 95% interval, when enabled
    pub interval: Option<ConfidenceInterval>,
    /// Row the model actually received
    pub record: TabularRow,
}

/// Turns order attributes into delivery time estimates.
///
/// Built once at startup; the predictor and column order are never
/// mutated or reloaded afterwards.
pub struct InferenceAdapter {
    predictor: Box<dyn Predictor>,
    columns: Option<Arc<ColumnOrder>>,
    residuals: Option<ResidualSource>,
}

impl InferenceAdapter {
    /// Load the model and side artifacts named in the configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(config.model.onnx_threads);
        let predictor = loader.load_predictor(&config.model)?;

        let columns = match &config.model.columns_path {
            Some(path) => Some(Arc::new(
                ColumnOrder::load(path).context("Failed to load column order")?,
            )),
            None => {
                if config.model.backend.is_positional() {
                    warn!(
                        backend = ?config.model.backend,
                        "Positional model configured without a column order, rows keep record order"
                    );
                }
                None
            }
        };

        let residuals = config
            .interval
            .enabled
            .then(|| ResidualSource::new(&config.interval.residual_std_path));

        info!(
            model = %predictor.name(),
            reconcile = columns.is_some(),
            interval = residuals.is_some(),
            "Inference adapter initialized"
        );

        Ok(Self::from_parts(predictor, columns, residuals))
    }

    /// Assemble an adapter from already loaded parts
    pub fn from_parts(
        predictor: Box<dyn Predictor>,
        columns: Option<Arc<ColumnOrder>>,
        residuals: Option<ResidualSource>,
    ) -> Self {
        Self {
            predictor,
            columns,
            residuals,
        }
    }

    pub fn model_name(&self) -> &str {
        self.predictor.name()
    }

    pub fn column_order(&self) -> Option<&ColumnOrder> {
        self.columns.as_deref()
    }

    /// Build the row handed to the predictor
    pub fn reconcile(&self, attributes: &OrderRecord) -> TabularRow {
        let row = TabularRow::from_record(attributes);
        match &self.columns {
            Some(order) => {
                let missing = order.missing_from(attributes);
                if !missing.is_empty() {
                    debug!(missing = ?missing, "Columns undefined after reconciliation");
                }
                row.reindex(order)
            }
            None => row,
        }
    }

    /// Predict delivery time for one order.
    ///
    /// Predictor errors are returned unchanged.
    pub fn predict(&self, attributes: &OrderRecord) -> Result<PredictionResult> {
        let record = self.reconcile(attributes);
        let point_estimate = self.predictor.predict(&record)?;

        let interval = self
            .residuals
            .as_ref()
            .map(|source| ConfidenceInterval::around(point_estimate, source.load_or_default()));

        debug!(
            model = %self.predictor.name(),
            point_estimate = point_estimate,
            interval = ?interval,
            "Inference complete"
        );

        Ok(PredictionResult {
            point_estimate,
            interval,
            record,
        })
    }
}
