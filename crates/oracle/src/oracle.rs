use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rain_oracle_core::{NumericField, ObservationSource};
use serde::{Deserialize, Serialize};
use slog::{error, info, warn, Logger};
use std::sync::Arc;
use time::Date;
use utoipa::ToSchema;

use crate::{FeatureBuilder, FeatureError, FeaturePolicy, PredictError, Predictor};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct PredictionResult {
    /// Requested date, YYYY-MM-DD
    pub date: String,
    /// Probability of rain, 5 decimals
    pub rain_probability: f64,
    pub will_rain: bool,
    /// Temperature (°C) of the reference observation, 1 decimal
    pub reference_temperature: f64,
    /// Relative humidity (%) of the reference observation, 1 decimal
    pub reference_humidity: f64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug, ToSchema)]
pub enum Error {
    #[error("not enough observations: {0}")]
    InsufficientData(String),
    #[error("no observation available: {0}")]
    NoDataForDate(String),
    #[error("prediction model unavailable")]
    ModelUnavailable,
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDateFormat(String),
    #[error("failed to read observations: {0}")]
    Store(String),
    #[error("prediction failed: {0}")]
    Model(String),
}

impl From<FeatureError> for Error {
    fn from(e: FeatureError) -> Self {
        match e {
            FeatureError::InsufficientData { .. } => Error::InsufficientData(e.to_string()),
            FeatureError::NoDataForDate(_) => Error::NoDataForDate(e.to_string()),
            FeatureError::Store(_) | FeatureError::Timestamp(_) => Error::Store(e.to_string()),
        }
    }
}

impl From<PredictError> for Error {
    fn from(e: PredictError) -> Self {
        match e {
            PredictError::ModelUnavailable => Error::ModelUnavailable,
            PredictError::Model(inner) => Error::Model(inner.to_string()),
        }
    }
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InsufficientData(_) | Error::NoDataForDate(_) => StatusCode::NOT_FOUND,
            Error::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidDateFormat(_) => StatusCode::BAD_REQUEST,
            Error::Store(_) | Error::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Store → features → model, for one requested date.
pub struct RainOracle {
    logger: Logger,
    features: FeatureBuilder,
    predictor: Predictor,
    policy: FeaturePolicy,
}

impl RainOracle {
    pub fn new(
        logger: Logger,
        source: Arc<dyn ObservationSource>,
        predictor: Predictor,
        policy: FeaturePolicy,
    ) -> Self {
        Self {
            features: FeatureBuilder::new(source, logger.clone()),
            logger,
            predictor,
            policy,
        }
    }

    pub fn policy(&self) -> FeaturePolicy {
        self.policy
    }

    pub fn model_loaded(&self) -> bool {
        self.predictor.is_loaded()
    }

    pub async fn predict(&self, date: Date) -> Result<PredictionResult, Error> {
        // an unloaded model fails every request, no need to touch the store
        if !self.predictor.is_loaded() {
            warn!(self.logger, "prediction for {} refused: model unavailable", date);
            return Err(Error::ModelUnavailable);
        }

        let built = self.features.build(self.policy, date).await.map_err(|e| {
            match e {
                FeatureError::Store(_) | FeatureError::Timestamp(_) => {
                    error!(self.logger, "error building features for {}: {}", date, e)
                }
                _ => info!(self.logger, "no features for {}: {}", date, e),
            }
            Error::from(e)
        })?;
        let prediction = self.predictor.predict(&built.vector)?;

        info!(
            self.logger,
            "prediction for {} ({}): p={:.5} rain={}",
            date,
            self.policy,
            prediction.probability,
            prediction.will_rain
        );

        Ok(PredictionResult {
            date: date.to_string(),
            rain_probability: round_to(prediction.probability, 5),
            will_rain: prediction.will_rain,
            reference_temperature: round_to(
                built.reference.value_or_zero(NumericField::Temperature),
                1,
            ),
            reference_humidity: round_to(built.reference.value_or_zero(NumericField::Humidity), 1),
        })
    }
}
