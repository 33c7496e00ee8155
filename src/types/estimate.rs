//! Delivery estimate responses

use crate::interval::ConfidenceInterval;
use crate::models::inference::PredictionResult;
use crate::reconcile::TabularRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Successful prediction reply
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryEstimate {
    /// Unique estimate identifier
    pub estimate_id: String,

    /// Associated order ID
    pub order_id: String,

    /// Predicted delivery time in minutes
    pub point_estimate: f64,

    /// 95% interval in minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<ConfidenceInterval>,

    /// Model that produced the estimate
    pub model: String,

    /// Row the model received
    pub inputs: TabularRow,

    /// Estimate generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl DeliveryEstimate {
    /// Create an estimate from an inference result
    pub fn from_prediction(order_id: String, model: &str, result: PredictionResult) -> Self {
        Self {
            estimate_id: uuid::Uuid::new_v4().to_string(),
            order_id,
            point_estimate: result.point_estimate,
            interval: result.interval,
            model: model.to_string(),
            inputs: result.record,
            timestamp: Utc::now(),
        }
    }

    /// Human readable summary, two decimals
    pub fn summary(&self) -> String {
        match &self.interval {
            Some(interval) => format!(
                "Estimated delivery time: {:.2} minutes (95% CI: {:.2} - {:.2})",
                self.point_estimate, interval.lower, interval.upper
            ),
            None => format!("Estimated delivery time: {:.2} minutes", self.point_estimate),
        }
    }
}

/// Failed request reply. Carries a generic message only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateFailure {
    /// Order ID, when the request could be decoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    /// Failure description
    pub error: String,

    /// Failure timestamp
    pub timestamp: DateTime<Utc>,
}

impl EstimateFailure {
    pub fn new(order_id: Option<String>, error: impl Into<String>) -> Self {
        Self {
            order_id,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Reply published for every request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EstimateReply {
    Ok(DeliveryEstimate),
    Failed(EstimateFailure),
}

impl EstimateReply {
    pub fn order_id(&self) -> Option<&str> {
        match self {
            EstimateReply::Ok(estimate) => Some(&estimate.order_id),
            EstimateReply::Failed(failure) => failure.order_id.as_deref(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, EstimateReply::Ok(_))
    }
}
