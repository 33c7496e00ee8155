//! Per-request processing: decode, validate, predict, reply.

use crate::metrics::ServiceMetrics;
use crate::models::inference::InferenceAdapter;
use crate::schema::{CategoryInput, OrderSchema};
use crate::types::estimate::{DeliveryEstimate, EstimateFailure, EstimateReply};
use crate::types::order::OrderRequest;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Message returned to callers when inference fails
pub const PREDICTION_FAILED: &str = "Prediction failed";

/// Turns one request payload into one reply
pub struct OrderHandler {
    adapter: InferenceAdapter,
    schema: OrderSchema,
    category_input: CategoryInput,
    metrics: Arc<ServiceMetrics>,
}

impl OrderHandler {
    pub fn new(
        adapter: InferenceAdapter,
        schema: OrderSchema,
        category_input: CategoryInput,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            adapter,
            schema,
            category_input,
            metrics,
        }
    }

    pub fn schema(&self) -> OrderSchema {
        self.schema
    }

    pub fn category_input(&self) -> CategoryInput {
        self.category_input
    }

    pub fn adapter(&self) -> &InferenceAdapter {
        &self.adapter
    }

    /// Handle a raw request payload
    pub fn handle(&self, payload: &[u8]) -> EstimateReply {
        let start_time = Instant::now();

        let request = match serde_json::from_slice::<OrderRequest>(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Failed to deserialize order request");
                self.metrics.record_rejected();
                return EstimateReply::Failed(EstimateFailure::new(
                    None,
                    format!("Malformed request: {}", e),
                ));
            }
        };

        let valid = self
            .schema
            .validate_with(&request.attributes, self.category_input);
        if let Err(e) = valid {
            warn!(order_id = %request.order_id, error = %e, "Order rejected");
            self.metrics.record_rejected();
            return EstimateReply::Failed(EstimateFailure::new(
                Some(request.order_id),
                format!("Invalid order: {}", e),
            ));
        }

        match self.adapter.predict(&request.attributes) {
            Ok(result) => {
                let latency = start_time.elapsed();
                self.metrics.record_prediction(latency, result.point_estimate);

                let estimate = DeliveryEstimate::from_prediction(
                    request.order_id,
                    self.adapter.model_name(),
                    result,
                );
                debug!(
                    order_id = %estimate.order_id,
                    point_estimate = estimate.point_estimate,
                    latency_us = latency.as_micros(),
                    "{}",
                    estimate.summary()
                );
                EstimateReply::Ok(estimate)
            }
            Err(e) => {
                error!(order_id = %request.order_id, error = %e, "Inference failed");
                self.metrics.record_failure();
                EstimateReply::Failed(EstimateFailure::new(
                    Some(request.order_id),
                    PREDICTION_FAILED,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelBackend;
    use crate::interval::ResidualSource;
    use crate::models::predictor::Predictor;
    use crate::reconcile::{ColumnOrder, TabularRow};
    use crate::types::order::FieldValue;
    use anyhow::{bail, Result};
    use std::sync::atomic::Ordering;

    /// Distance-proportional model that refuses rainy orders
    struct DistanceModel;

    impl Predictor for DistanceModel {
        fn predict(&self, row: &TabularRow) -> Result<f64> {
            if row.value("Weather") == Some(&FieldValue::Category("Rainy".to_string())) {
                bail!("rain not supported");
            }
            match row.value("Distance_km") {
                Some(FieldValue::Number(km)) => Ok(10.0 + 4.0 * km),
                _ => bail!("distance missing"),
            }
        }

        fn name(&self) -> &str {
            "distance"
        }

        fn backend(&self) -> ModelBackend {
            ModelBackend::Pickle
        }
    }

    fn handler(residuals: Option<ResidualSource>) -> (OrderHandler, Arc<ServiceMetrics>) {
        let metrics = Arc::new(ServiceMetrics::new());
        let order = ColumnOrder::new(["Distance_km", "Weather", "Hour", "Courier_Type"]);
        let adapter =
            InferenceAdapter::from_parts(Box::new(DistanceModel), Some(Arc::new(order)), residuals);
        (
            OrderHandler::new(
                adapter,
                OrderSchema::Hourly,
                CategoryInput::Labels,
                metrics.clone(),
            ),
            metrics,
        )
    }

    fn payload(weather: &str, distance: f64) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "order_id": "order-1",
            "attributes": {
                "Distance_km": distance,
                "Weather": weather,
                "Hour": 10,
                "Courier_Type": "Bike",
                "Preparation_Time_min": 15
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_successful_estimate() {
        let (handler, metrics) = handler(None);

        match handler.handle(&payload("Clear", 5.0)) {
            EstimateReply::Ok(estimate) => {
                assert_eq!(estimate.order_id, "order-1");
                assert_eq!(estimate.point_estimate, 30.0);
                assert_eq!(estimate.model, "distance");
                // reconciled: prep time dropped
                assert_eq!(estimate.inputs.len(), 4);
                assert!(estimate.interval.is_none());
            }
            EstimateReply::Failed(failure) => panic!("unexpected failure: {}", failure.error),
        }
        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_estimate_with_fallback_interval() {
        let dir = tempfile::tempdir().unwrap();
        let source = ResidualSource::new(dir.path().join("missing.pkl"));
        let (handler, _) = handler(Some(source));

        match handler.handle(&payload("Cloudy", 5.0)) {
            EstimateReply::Ok(estimate) => {
                let interval = estimate.interval.unwrap();
                assert!((interval.lower - 10.4).abs() < 1e-9);
                assert!((interval.upper - 49.6).abs() < 1e-9);
            }
            EstimateReply::Failed(failure) => panic!("unexpected failure: {}", failure.error),
        }
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        let (handler, metrics) = handler(None);

        let reply = handler.handle(b"not json");
        assert!(!reply.is_ok());
        assert!(reply.order_id().is_none());
        assert_eq!(metrics.rejected.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_invalid_order_is_rejected_before_inference() {
        let (handler, metrics) = handler(None);

        let reply = handler.handle(&payload("Clear", 75.0));
        assert!(!reply.is_ok());
        assert_eq!(reply.order_id(), Some("order-1"));
        assert_eq!(metrics.rejected.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_inference_failure_gives_generic_reply() {
        let (handler, metrics) = handler(None);

        match handler.handle(&payload("Rainy", 5.0)) {
            EstimateReply::Failed(failure) => {
                assert_eq!(failure.error, PREDICTION_FAILED);
                assert_eq!(failure.order_id.as_deref(), Some("order-1"));
            }
            EstimateReply::Ok(_) => panic!("expected failure"),
        }
        assert_eq!(metrics.failures.load(Ordering::Relaxed), 1);
    }

    /// Reads the row the way a float-only graph does
    struct NumericGraph;

    impl Predictor for NumericGraph {
        fn predict(&self, row: &TabularRow) -> Result<f64> {
            let input = row.to_f32_vec()?;
            Ok(input.iter().map(|v| *v as f64).sum())
        }

        fn name(&self) -> &str {
            "model_catboost"
        }

        fn backend(&self) -> ModelBackend {
            ModelBackend::Onnx
        }
    }

    fn numeric_handler() -> (OrderHandler, Arc<ServiceMetrics>) {
        let metrics = Arc::new(ServiceMetrics::new());
        let order = ColumnOrder::new(OrderSchema::Full.field_names());
        let adapter =
            InferenceAdapter::from_parts(Box::new(NumericGraph), Some(Arc::new(order)), None);
        (
            OrderHandler::new(
                adapter,
                OrderSchema::Full,
                CategoryInput::for_backend(ModelBackend::Onnx),
                metrics.clone(),
            ),
            metrics,
        )
    }

    fn coded_full_payload(weather: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "order_id": "order-7",
            "attributes": {
                "Distance_km": 7.5,
                "Weather": weather,
                "Traffic_Level": 2,
                "Time_of_Day": 3,
                "Vehicle_Type": 1,
                "Preparation_Time_min": 12,
                "Courier_Experience_yrs": 4,
                "Distance_category": 1,
                "Courier_Experience_category": 2
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_numeric_model_accepts_coded_full_order() {
        let (handler, metrics) = numeric_handler();

        match handler.handle(&coded_full_payload(serde_json::json!(0))) {
            EstimateReply::Ok(estimate) => {
                assert_eq!(estimate.order_id, "order-7");
                assert_eq!(estimate.model, "model_catboost");
                // 7.5 + 0 + 2 + 3 + 1 + 12 + 4 + 1 + 2
                assert!((estimate.point_estimate - 32.5).abs() < 1e-6);
                assert_eq!(estimate.inputs.len(), 9);
            }
            EstimateReply::Failed(failure) => panic!("unexpected failure: {}", failure.error),
        }
        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_numeric_model_rejects_unknown_code() {
        let (handler, metrics) = numeric_handler();

        let reply = handler.handle(&coded_full_payload(serde_json::json!(3)));
        assert!(!reply.is_ok());
        assert_eq!(metrics.rejected.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_numeric_model_reports_labels_as_failure() {
        let (handler, metrics) = numeric_handler();

        // valid at the boundary, but the graph cannot read a label
        match handler.handle(&coded_full_payload(serde_json::json!("Clear"))) {
            EstimateReply::Failed(failure) => assert_eq!(failure.error, PREDICTION_FAILED),
            EstimateReply::Ok(_) => panic!("expected failure"),
        }
        assert_eq!(metrics.failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_label_handler_rejects_codes() {
        let (handler, metrics) = handler(None);

        let body = serde_json::to_vec(&serde_json::json!({
            "attributes": {
                "Distance_km": 5.0,
                "Weather": 0,
                "Hour": 10,
                "Courier_Type": "Bike",
                "Preparation_Time_min": 15
            }
        }))
        .unwrap();
        assert!(!handler.handle(&body).is_ok());
        assert_eq!(metrics.rejected.load(Ordering::Relaxed), 1);
    }
}
