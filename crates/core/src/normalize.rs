//! Record normalisation: raw feed record -> typed [`Observation`].
//!
//! Provider values are trusted as-is (no range checks). The only guarantee is
//! that a numeric field ends up either a finite float or absent.

use serde_json::{Map, Value};
use slog::{debug, warn, Logger};

use crate::{
    observation::{format_timestamp, parse_timestamp},
    schema::{NumericField, TextField, STATION_ID_KEY, TIMESTAMP_KEY},
    Observation,
};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum NormalizeError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record has no `dh_utc` value")]
    MissingTimestamp,
    #[error("record timestamp {0:?} is not a recognised date-time")]
    BadTimestamp(String),
}

/// Outcome of normalising one batch payload.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub observations: Vec<Observation>,
    pub skipped: usize,
}

/// Coerce a raw value into a float; anything that is not a number or a
/// numeric string becomes absent.
pub fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                s.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Normalise one feed record.
///
/// `default_station` is used when the record carries no station id of its own
/// (the feed is queried one station at a time).
pub fn normalize_record(
    record: &Value,
    default_station: &str,
) -> Result<Observation, NormalizeError> {
    let record: &Map<String, Value> = record.as_object().ok_or(NormalizeError::NotAnObject)?;

    let raw_timestamp = match record.get(TIMESTAMP_KEY) {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        _ => return Err(NormalizeError::MissingTimestamp),
    };
    let timestamp = parse_timestamp(raw_timestamp)
        .and_then(format_timestamp)
        .map_err(|_| NormalizeError::BadTimestamp(raw_timestamp.clone()))?;

    let station_id = coerce_text(record.get(STATION_ID_KEY))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default_station.to_owned());

    let mut observation = Observation::new(station_id, timestamp);
    for field in NumericField::ALL {
        observation.set(*field, coerce_number(record.get(field.source_key())));
    }
    for field in TextField::ALL {
        observation.set_text(*field, coerce_text(record.get(field.source_key())));
    }
    Ok(observation)
}

/// Normalise every record of a batch, skipping (and logging) malformed ones.
pub fn normalize_batch(records: &[Value], default_station: &str, logger: &Logger) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for (position, record) in records.iter().enumerate() {
        match normalize_record(record, default_station) {
            Ok(observation) => batch.observations.push(observation),
            Err(e) => {
                warn!(logger, "skipping record {}: {}", position, e);
                batch.skipped += 1;
            }
        }
    }
    debug!(
        logger,
        "normalised {} records, skipped {}",
        batch.observations.len(),
        batch.skipped
    );
    batch
}
