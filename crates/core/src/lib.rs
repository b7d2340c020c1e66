//! Rain Oracle Core Library
//!
//! Shared pieces of the ingestion daemon and the prediction oracle:
//! - Observation schema (single source of field names and order)
//! - Record normalisation
//! - SQLite observation store
//! - Configuration loading (XDG-compliant) and logger construction

mod config;
pub mod db;
pub mod fs;
mod logging;
pub mod normalize;
pub mod observation;
pub mod schema;

pub use config::{find_config_file, load_config, ConfigError, ConfigSource};
pub use db::{ObservationSource, Store, StoreError};
pub use fs::ensure_parent_dir;
pub use logging::{parse_level, setup_logger};
pub use normalize::{normalize_batch, normalize_record, NormalizeError, NormalizedBatch};
pub use observation::{Observation, TimestampError};
pub use schema::{NumericField, TextField};

/// Application name used for XDG paths
pub const APP_NAME: &str = "rain-oracle";

/// Default oracle port
pub const DEFAULT_ORACLE_PORT: u16 = 8000;

/// Default daemon fetch interval (1 hour)
pub const DEFAULT_FETCH_INTERVAL: u64 = 3600;

/// Default station: ENS Lyon 7e
pub const DEFAULT_STATION_ID: &str = "000BG";

/// Default database file name, placed in the data directory
pub const DEFAULT_DB_FILE: &str = "weather.sqlite";
