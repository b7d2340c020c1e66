use async_trait::async_trait;
use slog::{debug, info, Logger};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row,
};
use std::{
    future::Future,
    str::FromStr,
    sync::{Arc, LazyLock},
    time::Duration,
};
use time::Date;
use tokio::sync::{mpsc, oneshot};

use super::{ObservationSource, StoreError};
use crate::{
    fs::ensure_parent_dir,
    observation::{day_bounds, format_timestamp, parse_timestamp},
    schema::{
        create_table_sql, data_columns, NumericField, TextField, STATION_ID_COLUMN,
        TIMESTAMP_COLUMN,
    },
    Observation,
};

type WriteOperation = std::pin::Pin<Box<dyn Future<Output = ()> + Send>>;

static UPSERT_SQL: LazyLock<String> = LazyLock::new(|| {
    let columns = data_columns();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT OR REPLACE INTO observations ({}) VALUES ({})",
        columns.join(", "),
        placeholders
    )
});

static SELECT_COLUMNS: LazyLock<String> = LazyLock::new(|| data_columns().join(", "));

/// Serialises every write of the process through one task, so concurrent
/// ingestion calls never contend for the SQLite write lock.
pub struct DatabaseWriter {
    write_tx: mpsc::UnboundedSender<WriteOperation>,
    _handle: tokio::task::JoinHandle<()>,
}

impl DatabaseWriter {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<WriteOperation>();

        let handle = tokio::spawn(async move {
            while let Some(future) = write_rx.recv().await {
                future.await;
            }
        });

        Self {
            write_tx,
            _handle: handle,
        }
    }

    pub async fn execute<T, F, Fut>(&self, pool: SqlitePool, operation: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(SqlitePool) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, StoreError>> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel::<Result<T, StoreError>>();

        let write_op = Box::pin(async move {
            let result = operation(pool).await;
            let _ = result_tx.send(result);
        });

        self.write_tx
            .send(write_op)
            .map_err(|_| StoreError::WriterClosed)?;

        result_rx.await.map_err(|_| StoreError::WriterClosed)?
    }
}

/// Durable observation table with insert-or-replace semantics on
/// `(station_id, timestamp_utc)`.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    writer: Arc<DatabaseWriter>,
    logger: Logger,
}

impl Store {
    /// Open (creating if needed) the database file at `db_path` and ensure the schema.
    pub async fn new(db_path: &str, logger: Logger) -> Result<Self, StoreError> {
        ensure_parent_dir(db_path, &logger)?;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))?
            .create_if_missing(true)
            .pragma("journal_mode", "WAL")
            .pragma("synchronous", "NORMAL")
            .pragma("busy_timeout", "5000")
            .pragma("cache_size", "-64000")
            .pragma("temp_store", "MEMORY");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        let store = Self::from_pool(pool, logger);
        store.ensure_schema().await?;
        info!(store.logger, "SQLite observation store initialized at: {}", db_path);
        Ok(store)
    }

    /// A private in-memory database, used by tests and dry runs.
    pub async fn in_memory(logger: Logger) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // every connection to :memory: is its own database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self::from_pool(pool, logger);
        store.ensure_schema().await?;
        Ok(store)
    }

    fn from_pool(pool: SqlitePool, logger: Logger) -> Self {
        Self {
            pool,
            writer: Arc::new(DatabaseWriter::new()),
            logger,
        }
    }

    /// Idempotent: creates the table and its timestamp index only when absent.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(&create_table_sql()).execute(&self.pool).await?;
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_observations_timestamp ON observations ({})",
            TIMESTAMP_COLUMN
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or fully replace each observation, all in one transaction.
    ///
    /// Returns the number of rows written. Either every row commits or none does.
    /// Timestamps are rewritten to the canonical form; an unparseable one
    /// rejects the whole batch before anything is written.
    pub async fn upsert(&self, mut observations: Vec<Observation>) -> Result<u64, StoreError> {
        if observations.is_empty() {
            return Ok(0);
        }
        for observation in &mut observations {
            let parsed = parse_timestamp(&observation.timestamp_utc)?;
            observation.timestamp_utc = format_timestamp(parsed)?;
        }
        let pool = self.pool.clone();
        let count = observations.len();

        let written = self
            .writer
            .execute(pool, move |pool| async move {
                let mut tx = pool.begin().await?;
                let mut written = 0;

                for observation in &observations {
                    let mut query = sqlx::query(UPSERT_SQL.as_str())
                        .bind(&observation.station_id)
                        .bind(&observation.timestamp_utc);
                    for field in NumericField::ALL {
                        query = query.bind(observation.get(*field));
                    }
                    for field in TextField::ALL {
                        query = query.bind(observation.text(*field));
                    }
                    written += query.execute(&mut *tx).await?.rows_affected();
                }

                tx.commit().await?;
                Ok(written)
            })
            .await?;

        debug!(self.logger, "upserted {} observations ({} rows)", count, written);
        Ok(written)
    }

    /// Number of stored rows.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM observations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// The stored observation for an exact key, if any.
    pub async fn get(
        &self,
        station_id: &str,
        timestamp_utc: &str,
    ) -> Result<Option<Observation>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM observations WHERE {} = ? AND {} = ?",
            SELECT_COLUMNS.as_str(),
            STATION_ID_COLUMN,
            TIMESTAMP_COLUMN
        ))
        .bind(station_id)
        .bind(timestamp_utc)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_observation).transpose()
    }
}

fn row_to_observation(row: &SqliteRow) -> Result<Observation, StoreError> {
    let mut observation = Observation::new(
        row.try_get::<String, _>(STATION_ID_COLUMN)?,
        row.try_get::<String, _>(TIMESTAMP_COLUMN)?,
    );
    for field in NumericField::ALL {
        observation.set(*field, row.try_get::<Option<f64>, _>(field.column())?);
    }
    for field in TextField::ALL {
        observation.set_text(*field, row.try_get::<Option<String>, _>(field.column())?);
    }
    Ok(observation)
}

#[async_trait]
impl ObservationSource for Store {
    async fn recent_observations(&self, limit: u32) -> Result<Vec<Observation>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM observations ORDER BY {} DESC, {} LIMIT ?",
            SELECT_COLUMNS.as_str(),
            TIMESTAMP_COLUMN,
            STATION_ID_COLUMN
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_observation).collect()
    }

    async fn observation_on(&self, date: Date) -> Result<Option<Observation>, StoreError> {
        let (start, end) = day_bounds(date)?;
        let row = sqlx::query(&format!(
            "SELECT {columns} FROM observations
             WHERE {ts} >= ? AND {ts} < ?
             ORDER BY {ts} DESC, {station} LIMIT 1",
            columns = SELECT_COLUMNS.as_str(),
            ts = TIMESTAMP_COLUMN,
            station = STATION_ID_COLUMN
        ))
        .bind(start)
        .bind(end)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_observation).transpose()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;

        let result: String = sqlx::query_scalar("PRAGMA quick_check;")
            .fetch_one(&self.pool)
            .await?;
        if result != "ok" {
            return Err(StoreError::Integrity(result));
        }
        Ok(())
    }
}
