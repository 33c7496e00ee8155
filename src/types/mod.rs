//! Type definitions for the delivery time predictor

pub mod estimate;
pub mod order;

pub use estimate::{DeliveryEstimate, EstimateFailure, EstimateReply};
pub use order::{FieldValue, OrderRecord, OrderRequest};
