//! Confidence intervals around point estimates

use crate::models::loader::read_artifact;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Two-sided 95% normal quantile
pub const Z_95: f64 = 1.96;

/// Residual standard deviation used when the residual artifact is unavailable
pub const DEFAULT_RESIDUAL_STD: f64 = 10.0;

/// Symmetric interval around a point estimate, in minutes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    /// 95% interval: `point ± 1.96 * res_std`
    pub fn around(point: f64, res_std: f64) -> Self {
        let half_width = Z_95 * res_std;
        Self {
            lower: point - half_width,
            upper: point + half_width,
        }
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }
}

/// Residual artifact layouts: a bare scalar or a keyed statistic
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResidualArtifact {
    Scalar(f64),
    Keyed { res_std: f64 },
}

/// Residual standard deviation artifact, re-read on every prediction
#[derive(Debug, Clone)]
pub struct ResidualSource {
    path: PathBuf,
}

impl ResidualSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the residual standard deviation
    pub fn load(&self) -> Result<f64> {
        let res_std = match read_artifact::<ResidualArtifact>(&self.path)? {
            ResidualArtifact::Scalar(value) => value,
            ResidualArtifact::Keyed { res_std } => res_std,
        };

        if !res_std.is_finite() || res_std < 0.0 {
            bail!(
                "Residual std in {} must be finite and non-negative, got {}",
                self.path.display(),
                res_std
            );
        }
        Ok(res_std)
    }

    /// Read the residual standard deviation, substituting
    /// [`DEFAULT_RESIDUAL_STD`] on any failure.
    ///
    /// This is the only place a failure is swallowed.
    pub fn load_or_default(&self) -> f64 {
        self.load().unwrap_or(DEFAULT_RESIDUAL_STD)
    }
}
