//! Feature construction over stored observations.
//!
//! Both policies produce the same fixed-order vector, the order the classifier
//! and imputer were fitted with: see [`FEATURE_ORDER`].

use clap::ValueEnum;
use rain_oracle_core::{
    observation::TimestampError, NumericField, Observation, ObservationSource, StoreError,
};
use serde::Deserialize;
use slog::{debug, Logger};
use std::sync::Arc;
use time::Date;

pub const FEATURE_WIDTH: usize = 8;

/// Rows averaged by the recency-weighted policy.
pub const RECENCY_WINDOW: usize = 5;

/// Applied positionally to rows as returned (newest first).
pub const RECENCY_WEIGHTS: [f64; RECENCY_WINDOW] = [0.3, 0.3, 0.4, 0.5, 0.6];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSource {
    Field(NumericField),
    HourOfDay,
    MonthOfYear,
}

pub const FEATURE_ORDER: [FeatureSource; FEATURE_WIDTH] = [
    FeatureSource::Field(NumericField::Temperature),
    FeatureSource::Field(NumericField::Pressure),
    FeatureSource::Field(NumericField::Humidity),
    FeatureSource::Field(NumericField::DewPoint),
    FeatureSource::Field(NumericField::WindMean),
    FeatureSource::Field(NumericField::WindGust),
    FeatureSource::HourOfDay,
    FeatureSource::MonthOfYear,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeaturePolicy {
    /// Weighted average of the five most recent observations.
    #[default]
    RecencyWeighted,
    /// The observation of the requested day, else of the day before.
    DateMatched,
}

impl std::fmt::Display for FeaturePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeaturePolicy::RecencyWeighted => write!(f, "recency-weighted"),
            FeaturePolicy::DateMatched => write!(f, "date-matched"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_WIDTH]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, source: FeatureSource) -> Option<f64> {
        FEATURE_ORDER
            .iter()
            .position(|s| *s == source)
            .map(|index| self.0[index])
    }
}

/// A feature vector plus the observation its reference readings come from.
#[derive(Debug, Clone)]
pub struct BuiltFeatures {
    pub vector: FeatureVector,
    pub reference: Observation,
}

#[derive(thiserror::Error, Debug)]
pub enum FeatureError {
    #[error("need {needed} observations, found {found}")]
    InsufficientData { needed: usize, found: usize },
    #[error("no observation for {0} or the day before")]
    NoDataForDate(Date),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("stored observation has a bad timestamp: {0}")]
    Timestamp(#[from] TimestampError),
}

pub struct FeatureBuilder {
    source: Arc<dyn ObservationSource>,
    logger: Logger,
}

impl FeatureBuilder {
    pub fn new(source: Arc<dyn ObservationSource>, logger: Logger) -> Self {
        Self { source, logger }
    }

    pub async fn build(
        &self,
        policy: FeaturePolicy,
        date: Date,
    ) -> Result<BuiltFeatures, FeatureError> {
        match policy {
            FeaturePolicy::RecencyWeighted => self.recency_weighted().await,
            FeaturePolicy::DateMatched => self.date_matched(date).await,
        }
    }

    pub async fn recency_weighted(&self) -> Result<BuiltFeatures, FeatureError> {
        let rows = self
            .source
            .recent_observations(RECENCY_WINDOW as u32)
            .await?;
        if rows.len() < RECENCY_WINDOW {
            return Err(FeatureError::InsufficientData {
                needed: RECENCY_WINDOW,
                found: rows.len(),
            });
        }
        debug!(
            self.logger,
            "weighting {} observations, newest {}", rows.len(), rows[0].timestamp_utc
        );

        let vector = weighted_features(&rows[..RECENCY_WINDOW])?;
        let reference = rows.into_iter().next().ok_or(FeatureError::InsufficientData {
            needed: RECENCY_WINDOW,
            found: 0,
        })?;
        Ok(BuiltFeatures { vector, reference })
    }

    pub async fn date_matched(&self, date: Date) -> Result<BuiltFeatures, FeatureError> {
        let reference = self
            .source
            .observation_on_or_previous_day(date)
            .await?
            .ok_or(FeatureError::NoDataForDate(date))?;
        debug!(
            self.logger,
            "using observation {} for {}", reference.timestamp_utc, date
        );
        Ok(BuiltFeatures {
            vector: single_features(&reference)?,
            reference,
        })
    }
}

fn calendar_feature(observation: &Observation, source: FeatureSource) -> Result<f64, FeatureError> {
    let observed_at = observation.observed_at()?;
    Ok(match source {
        FeatureSource::HourOfDay => f64::from(observed_at.hour()),
        FeatureSource::MonthOfYear => f64::from(u8::from(observed_at.month())),
        FeatureSource::Field(field) => observation.value_or_zero(field),
    })
}

/// Features of a single observation, absent readings as `0.0`.
pub fn single_features(observation: &Observation) -> Result<FeatureVector, FeatureError> {
    let mut values = [0.0; FEATURE_WIDTH];
    for (slot, source) in values.iter_mut().zip(FEATURE_ORDER) {
        *slot = calendar_feature(observation, source)?;
    }
    Ok(FeatureVector(values))
}

/// `sum(w_i * x_i) / sum(w_i)` per sensor column over `rows` (newest first),
/// with hour and month taken from the newest row.
pub fn weighted_features(rows: &[Observation]) -> Result<FeatureVector, FeatureError> {
    let newest = rows.first().ok_or(FeatureError::InsufficientData {
        needed: RECENCY_WINDOW,
        found: 0,
    })?;
    let total_weight: f64 = RECENCY_WEIGHTS.iter().take(rows.len()).sum();

    let mut values = [0.0; FEATURE_WIDTH];
    for (slot, source) in values.iter_mut().zip(FEATURE_ORDER) {
        *slot = match source {
            FeatureSource::Field(field) => {
                rows.iter()
                    .zip(RECENCY_WEIGHTS)
                    .map(|(row, weight)| weight * row.value_or_zero(field))
                    .sum::<f64>()
                    / total_weight
            }
            calendar => calendar_feature(newest, calendar)?,
        };
    }
    Ok(FeatureVector(values))
}
