//! Model loading and inference components

pub mod inference;
pub mod linear;
pub mod loader;
pub mod onnx;
pub mod predictor;
pub mod tree;

pub use inference::{InferenceAdapter, PredictionResult};
pub use linear::LinearEstimator;
pub use loader::ModelLoader;
pub use onnx::OnnxPredictor;
pub use predictor::Predictor;
pub use tree::TreeEnsemble;
