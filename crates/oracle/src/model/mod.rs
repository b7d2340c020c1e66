mod forest;
mod imputer;
mod predictor;

pub use forest::*;
pub use imputer::*;
pub use predictor::*;

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode artifact {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid artifact: {0}")]
    Invalid(String),
    #[error("expected {expected} features, got {actual}")]
    Width { expected: usize, actual: usize },
}

/// A fitted binary classifier over dense feature rows.
pub trait Classifier: Send + Sync {
    /// Probability of the positive ("rain") class.
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError>;

    fn predict(&self, features: &[f64]) -> Result<bool, ModelError> {
        Ok(self.predict_proba(features)? > 0.5)
    }
}

pub(crate) fn read_artifact<T: serde::de::DeserializeOwned>(
    path: &std::path::Path,
) -> Result<T, ModelError> {
    let raw = std::fs::read(path).map_err(|source| ModelError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| ModelError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
