use crate::FeedSettings;
use clap::Parser;
use rain_oracle_core::{
    find_config_file, load_config, observation::DATE_FORMAT, ConfigSource, DEFAULT_DB_FILE,
    DEFAULT_FETCH_INTERVAL, DEFAULT_STATION_ID,
};
use std::time::Duration;
use time::{Date, OffsetDateTime};

pub const DEFAULT_BASE_URL: &str = "https://www.infoclimat.fr/opendata";
pub const DEFAULT_BATCH_DAYS: u32 = 30;
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 60;
pub const DEFAULT_LOOKBACK_DAYS: u32 = 3;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RangeError {
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("--start and --end must be given together")]
    Incomplete,
    #[error("start date {start} is after end date {end}")]
    Reversed { start: Date, end: Date },
}

#[derive(Parser, Clone, Debug, serde::Deserialize, Default)]
#[command(
    author,
    version,
    about = "Rain Daemon - Collects Infoclimat observations into the local weather store"
)]
pub struct Cli {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $RAIN_DAEMON_CONFIG, ./daemon.toml,
    /// $XDG_CONFIG_HOME/rain-oracle/daemon.toml, /etc/rain-oracle/daemon.toml
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "RAIN_DAEMON_LEVEL")]
    pub level: Option<String>,

    /// Path to the SQLite weather store
    #[arg(short, long, env = "RAIN_DAEMON_DB_PATH")]
    pub db_path: Option<String>,

    /// Infoclimat station identifier
    #[arg(short, long, env = "RAIN_DAEMON_STATION_ID")]
    pub station_id: Option<String>,

    /// Infoclimat open-data endpoint
    #[arg(short, long, env = "RAIN_DAEMON_BASE_URL")]
    pub base_url: Option<String>,

    /// Infoclimat API token
    #[arg(short, long, env = "RAIN_DAEMON_TOKEN")]
    pub token: Option<String>,

    /// Maximum number of days requested per call
    #[arg(long, env = "RAIN_DAEMON_BATCH_DAYS")]
    pub batch_days: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long, env = "RAIN_DAEMON_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// Seconds between two ingestion passes in periodic mode
    #[arg(short = 'i', long, env = "RAIN_DAEMON_SLEEP_INTERVAL")]
    pub sleep_interval: Option<u64>,

    /// Days re-fetched on each periodic pass (late corrections get upserted)
    #[arg(long, env = "RAIN_DAEMON_LOOKBACK_DAYS")]
    pub lookback_days: Option<u32>,

    /// HTTP User-Agent header for feed requests
    #[arg(short, long, env = "RAIN_DAEMON_USER_AGENT")]
    pub user_agent: Option<String>,

    /// First day to ingest (YYYY-MM-DD); with --end runs a single pass and exits
    #[arg(long)]
    #[serde(skip)]
    pub start: Option<String>,

    /// Last day to ingest, inclusive (YYYY-MM-DD)
    #[arg(long)]
    #[serde(skip)]
    pub end: Option<String>,
}

impl Cli {
    pub fn db_path(&self) -> String {
        self.db_path
            .clone()
            .unwrap_or_else(|| format!("./data/{}", DEFAULT_DB_FILE))
    }

    pub fn station_id(&self) -> String {
        self.station_id
            .clone()
            .unwrap_or_else(|| DEFAULT_STATION_ID.to_string())
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn token(&self) -> String {
        self.token.clone().unwrap_or_default()
    }

    pub fn batch_days(&self) -> u32 {
        self.batch_days.unwrap_or(DEFAULT_BATCH_DAYS).max(1)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
    }

    pub fn sleep_interval(&self) -> u64 {
        self.sleep_interval.unwrap_or(DEFAULT_FETCH_INTERVAL).max(1)
    }

    pub fn lookback_days(&self) -> u32 {
        self.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("rain-oracle-daemon/{}", env!("CARGO_PKG_VERSION")))
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            base_url: self.base_url(),
            token: self.token(),
            batch_days: self.batch_days(),
            request_timeout: self.request_timeout(),
            user_agent: self.user_agent(),
        }
    }

    /// The explicit one-shot range, if `--start`/`--end` were given.
    pub fn date_range(&self) -> Result<Option<(Date, Date)>, RangeError> {
        match (self.start.as_deref(), self.end.as_deref()) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => {
                let start = parse_date(start)?;
                let end = parse_date(end)?;
                if start > end {
                    return Err(RangeError::Reversed { start, end });
                }
                Ok(Some((start, end)))
            }
            _ => Err(RangeError::Incomplete),
        }
    }
}

pub fn parse_date(raw: &str) -> Result<Date, RangeError> {
    Date::parse(raw.trim(), DATE_FORMAT).map_err(|_| RangeError::InvalidDate(raw.to_string()))
}

/// Rolling window used by periodic mode: `[today - lookback_days, today]`.
pub fn lookback_range(now: OffsetDateTime, lookback_days: u32) -> (Date, Date) {
    let end = now.date();
    let start = end
        .checked_sub(time::Duration::days(i64::from(lookback_days)))
        .unwrap_or(Date::MIN);
    (start, end)
}

/// Load configuration from CLI args, config file, and environment
pub fn get_config_info() -> Cli {
    let cli_args = Cli::parse();

    let source = if let Some(ref path) = cli_args.config {
        ConfigSource::Explicit(path.into())
    } else {
        find_config_file("RAIN_DAEMON_CONFIG", "daemon.toml")
    };

    let file_config: Cli = load_config(&source).unwrap_or_default();

    // CLI args override file config (env vars are handled by clap)
    Cli {
        config: cli_args.config,
        level: cli_args.level.or(file_config.level),
        db_path: cli_args.db_path.or(file_config.db_path),
        station_id: cli_args.station_id.or(file_config.station_id),
        base_url: cli_args.base_url.or(file_config.base_url),
        token: cli_args.token.or(file_config.token),
        batch_days: cli_args.batch_days.or(file_config.batch_days),
        request_timeout: cli_args.request_timeout.or(file_config.request_timeout),
        sleep_interval: cli_args.sleep_interval.or(file_config.sleep_interval),
        lookback_days: cli_args.lookback_days.or(file_config.lookback_days),
        user_agent: cli_args.user_agent.or(file_config.user_agent),
        start: cli_args.start,
        end: cli_args.end,
    }
}
