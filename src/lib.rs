//! Delivery Time Predictor Library
//!
//! Serves delivery time estimates from a pre-trained regression model
//! (ONNX graph, pickled estimator or native tree checkpoint), with optional
//! 95% confidence intervals from a residual standard deviation artifact.

pub mod config;
pub mod consumer;
pub mod handler;
pub mod interval;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod reconcile;
pub mod schema;
pub mod types;

pub use config::AppConfig;
pub use consumer::{OrderConsumer, OrderIntake};
pub use handler::OrderHandler;
pub use interval::{ConfidenceInterval, ResidualSource};
pub use models::inference::{InferenceAdapter, PredictionResult};
pub use producer::EstimateProducer;
pub use reconcile::{ColumnOrder, TabularRow};
pub use schema::{CategoryInput, OrderSchema};
pub use types::{estimate::DeliveryEstimate, order::OrderRecord};
