use super::InfoclimatClient;
use rain_oracle_core::{normalize_batch, Store, StoreError};
use slog::{info, warn, Logger};
use std::sync::Arc;
use time::Date;

/// Outcome of one collect → normalise → store pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestionReport {
    /// Windows the range was split into.
    pub windows: usize,
    /// Windows that produced records.
    pub batches: usize,
    pub records: usize,
    pub skipped: usize,
    pub written: u64,
}

pub struct IngestionService {
    logger: Logger,
    client: Arc<InfoclimatClient>,
    store: Store,
}

impl IngestionService {
    pub fn new(logger: Logger, client: Arc<InfoclimatClient>, store: Store) -> Self {
        Self {
            logger,
            client,
            store,
        }
    }

    pub async fn run(
        &self,
        station_id: &str,
        start: Date,
        end: Date,
    ) -> Result<IngestionReport, StoreError> {
        let windows = super::partition_range(start, end, self.client.batch_days()).len();
        info!(
            self.logger,
            "ingesting {} from {} to {} ({} windows)", station_id, start, end, windows
        );

        let batches = self.client.fetch(station_id, start, end).await;
        let mut report = IngestionReport {
            windows,
            batches: batches.len(),
            ..Default::default()
        };

        let mut observations = Vec::new();
        for batch in &batches {
            report.records += batch.records.len();
            let normalized = normalize_batch(&batch.records, &batch.station_id, &self.logger);
            report.skipped += normalized.skipped;
            observations.extend(normalized.observations);
        }

        if observations.is_empty() {
            warn!(
                self.logger,
                "no observations to store for {} between {} and {}", station_id, start, end
            );
            return Ok(report);
        }

        report.written = self.store.upsert(observations).await?;
        info!(
            self.logger,
            "stored {} rows for {} ({} records, {} skipped)",
            report.written,
            station_id,
            report.records,
            report.skipped
        );
        Ok(report)
    }
}
