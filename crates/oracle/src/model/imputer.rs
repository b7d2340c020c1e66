use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{read_artifact, ModelError};
use crate::FEATURE_WIDTH;

/// Fitted per-column missing-value imputer.
///
/// `statistics[i]` replaces a missing value in column `i`. With
/// `missing_values: null` only NaN counts as missing; with a number, that
/// number (and NaN) does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    pub strategy: String,
    pub statistics: Vec<f64>,
    #[serde(default)]
    pub missing_values: Option<f64>,
}

impl Imputer {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let imputer: Imputer = read_artifact(path)?;
        imputer.validate()?;
        Ok(imputer)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.statistics.len() != FEATURE_WIDTH {
            return Err(ModelError::Width {
                expected: FEATURE_WIDTH,
                actual: self.statistics.len(),
            });
        }
        if let Some(position) = self.statistics.iter().position(|s| !s.is_finite()) {
            return Err(ModelError::Invalid(format!(
                "imputer statistic {} is not finite",
                position
            )));
        }
        Ok(())
    }

    fn is_missing(&self, value: f64) -> bool {
        value.is_nan() || self.missing_values == Some(value)
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        if row.len() != self.statistics.len() {
            return Err(ModelError::Width {
                expected: self.statistics.len(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(&self.statistics)
            .map(|(&value, &fill)| if self.is_missing(value) { fill } else { value })
            .collect())
    }
}
