//! Model and side-artifact loading

use crate::config::{ModelBackend, ModelConfig};
use crate::models::linear::LinearEstimator;
use crate::models::onnx::OnnxPredictor;
use crate::models::predictor::Predictor;
use crate::models::tree::TreeEnsemble;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::info;

/// On-disk encoding of a side artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Pickle,
    Json,
}

impl ArtifactFormat {
    /// `.pkl` and `.pickle` files are pickles, everything else is JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("pkl") | Some("pickle") => ArtifactFormat::Pickle,
            _ => ArtifactFormat::Json,
        }
    }
}

/// Read and decode a side artifact, choosing the format by extension
pub fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    match ArtifactFormat::from_path(path) {
        ArtifactFormat::Pickle => serde_pickle::from_slice(&bytes, serde_pickle::DeOptions::new())
            .with_context(|| format!("Failed to unpickle {}", path.display())),
        ArtifactFormat::Json => serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", path.display())),
    }
}

/// ONNX session with the input it is fed through
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the model
    pub input_name: String,
}

/// Loader for model artifacts
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with the specified number of ONNX threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self { onnx_threads }
    }

    /// Load the configured model behind the [`Predictor`] interface
    pub fn load_predictor(&self, config: &ModelConfig) -> Result<Box<dyn Predictor>> {
        let path = Path::new(&config.path);
        let name = model_name(path);

        info!(
            model = %name,
            backend = ?config.backend,
            path = %path.display(),
            "Loading model"
        );

        let predictor: Box<dyn Predictor> = match config.backend {
            ModelBackend::Onnx => {
                let model = self.load_onnx(path, &name, &config.input_name)?;
                Box::new(OnnxPredictor::new(model))
            }
            ModelBackend::Pickle => Box::new(LinearEstimator::load(path, &name)?),
            ModelBackend::Checkpoint => Box::new(TreeEnsemble::load(path, &name)?),
        };

        info!(model = %name, backend = ?predictor.backend(), "Model loaded successfully");
        Ok(predictor)
    }

    /// Load an ONNX model from file
    pub fn load_onnx(&self, path: &Path, name: &str, input_name: &str) -> Result<LoadedModel> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        if !session.inputs.iter().any(|i| i.name == input_name) {
            let available: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
            anyhow::bail!(
                "Model {} has no input named '{}' (inputs: {:?})",
                name,
                input_name,
                available
            );
        }

        info!(
            model = %name,
            input = %input_name,
            threads = self.onnx_threads,
            outputs = session.outputs.len(),
            "ONNX session ready"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            input_name: input_name.to_string(),
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::with_threads(1)
    }
}

/// Model name derived from the artifact file stem
fn model_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("model")
        .to_string()
}
