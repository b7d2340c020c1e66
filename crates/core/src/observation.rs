use time::{
    format_description::{well_known::Rfc3339, BorrowedFormatItem},
    macros::format_description,
    Date, OffsetDateTime, PrimitiveDateTime, UtcOffset,
};

use crate::schema::{NumericField, TextField};

/// Storage form of every timestamp; lexical order equals chronological order.
pub const CANONICAL_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Calendar dates as accepted on the prediction endpoint and sent to the feed.
pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

const ISO_T_SEPARATED: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const WITHOUT_SECONDS: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum TimestampError {
    #[error("unrecognised timestamp: {0:?}")]
    Unrecognised(String),
    #[error("failed to format timestamp: {0}")]
    Format(String),
}

/// Parse the timestamp shapes the feed (and older rows) may carry into a UTC datetime.
pub fn parse_timestamp(raw: &str) -> Result<PrimitiveDateTime, TimestampError> {
    let raw = raw.trim();
    for format in [CANONICAL_TIMESTAMP, ISO_T_SEPARATED, WITHOUT_SECONDS] {
        if let Ok(parsed) = PrimitiveDateTime::parse(raw, format) {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        let utc = parsed.to_offset(UtcOffset::UTC);
        return Ok(PrimitiveDateTime::new(utc.date(), utc.time()));
    }
    Err(TimestampError::Unrecognised(raw.to_owned()))
}

pub fn format_timestamp(value: PrimitiveDateTime) -> Result<String, TimestampError> {
    value
        .format(CANONICAL_TIMESTAMP)
        .map_err(|e| TimestampError::Format(e.to_string()))
}

/// Half-open canonical range `[start, end)` covering every hour of `date`.
///
/// The upper bound is `<date> 24:00:00`, which sorts after any real hour of
/// that day and before the first hour of the next one.
pub fn day_bounds(date: Date) -> Result<(String, String), TimestampError> {
    let start = format_timestamp(date.midnight())?;
    let day = date
        .format(DATE_FORMAT)
        .map_err(|e| TimestampError::Format(e.to_string()))?;
    Ok((start, format!("{day} 24:00:00")))
}

/// One station-hour reading. Keyed by `(station_id, timestamp_utc)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub station_id: String,
    pub timestamp_utc: String,
    numeric: [Option<f64>; NumericField::COUNT],
    text: [Option<String>; TextField::COUNT],
}

impl Observation {
    /// An observation with every field absent.
    pub fn new(station_id: impl Into<String>, timestamp_utc: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            timestamp_utc: timestamp_utc.into(),
            numeric: [None; NumericField::COUNT],
            text: std::array::from_fn(|_| None),
        }
    }

    pub fn get(&self, field: NumericField) -> Option<f64> {
        self.numeric[field.index()]
    }

    /// Set a numeric field; non-finite values are stored as absent.
    pub fn set(&mut self, field: NumericField, value: Option<f64>) {
        self.numeric[field.index()] = value.filter(|v| v.is_finite());
    }

    /// Builder-style [`Observation::set`].
    pub fn with(mut self, field: NumericField, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }

    pub fn text(&self, field: TextField) -> Option<&str> {
        self.text[field.index()].as_deref()
    }

    pub fn set_text(&mut self, field: TextField, value: Option<String>) {
        self.text[field.index()] = value;
    }

    /// Value of `field`, or `0.0` when the sensor reported nothing.
    pub fn value_or_zero(&self, field: NumericField) -> f64 {
        self.get(field).unwrap_or(0.0)
    }

    pub fn observed_at(&self) -> Result<PrimitiveDateTime, TimestampError> {
        parse_timestamp(&self.timestamp_utc)
    }
}
