mod sqlite;

pub use sqlite::*;

use async_trait::async_trait;
use time::Date;

use crate::{observation::TimestampError, Observation};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Failed to query sqlite: {0}")]
    Query(#[from] sqlx::Error),
    #[error("Failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to build timestamp bound: {0}")]
    Timestamp(#[from] TimestampError),
    #[error("Database writer channel closed")]
    WriterClosed,
    #[error("Database integrity check failed: {0}")]
    Integrity(String),
}

/// Read side of the observation store, as consumed by feature construction.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// The `limit` most recent observations across all stations, newest first.
    async fn recent_observations(&self, limit: u32) -> Result<Vec<Observation>, StoreError>;

    /// The latest observation whose calendar date is `date`, if any.
    async fn observation_on(&self, date: Date) -> Result<Option<Observation>, StoreError>;

    /// [`ObservationSource::observation_on`] for `date`, else for the day before.
    async fn observation_on_or_previous_day(
        &self,
        date: Date,
    ) -> Result<Option<Observation>, StoreError> {
        if let Some(found) = self.observation_on(date).await? {
            return Ok(Some(found));
        }
        match date.previous_day() {
            Some(previous) => self.observation_on(previous).await,
            None => Ok(None),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError>;
}
