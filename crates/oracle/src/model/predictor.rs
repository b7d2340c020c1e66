use slog::{error, info, Logger};
use std::path::Path;

use super::{Classifier, Imputer, ModelError, RandomForest};
use crate::FeatureVector;

#[derive(thiserror::Error, Debug)]
pub enum PredictError {
    #[error("rain model or imputer is not loaded")]
    ModelUnavailable,
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub probability: f64,
    pub will_rain: bool,
}

struct Models {
    imputer: Imputer,
    classifier: Box<dyn Classifier>,
}

/// Imputer + classifier pair, loaded once at startup and read-only afterwards.
pub struct Predictor {
    models: Option<Models>,
}

impl Predictor {
    pub fn new(imputer: Imputer, classifier: Box<dyn Classifier>) -> Self {
        Self {
            models: Some(Models {
                imputer,
                classifier,
            }),
        }
    }

    pub fn unavailable() -> Self {
        Self { models: None }
    }

    /// Load both artifacts. Any failure is logged and yields a predictor that
    /// answers [`PredictError::ModelUnavailable`] until the process restarts.
    pub fn load(imputer_path: &Path, model_path: &Path, logger: &Logger) -> Self {
        let loaded = Imputer::load(imputer_path).and_then(|imputer| {
            RandomForest::load(model_path).map(|forest| (imputer, forest))
        });
        match loaded {
            Ok((imputer, forest)) => {
                info!(
                    logger,
                    "rain model loaded: {} trees, imputer strategy {}",
                    forest.trees.len(),
                    imputer.strategy
                );
                Self::new(imputer, Box::new(forest))
            }
            Err(e) => {
                error!(logger, "rain model unavailable: {}", e);
                Self::unavailable()
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.models.is_some()
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, PredictError> {
        let models = self.models.as_ref().ok_or(PredictError::ModelUnavailable)?;
        let imputed = models.imputer.transform(features.as_slice())?;
        Ok(Prediction {
            probability: models.classifier.predict_proba(&imputed)?,
            will_rain: models.classifier.predict(&imputed)?,
        })
    }
}
