use rain_oracle_core::observation::DATE_FORMAT;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use slog::{debug, error, info, warn, Logger};
use std::time::Duration;
use time::Date;

/// Fixed selectors of the Infoclimat open-data API.
const API_VERSION: &str = "2";
const API_METHOD: &str = "get";
const API_FORMAT: &str = "json";

/// Inclusive date range fetched by a single remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Date,
    pub end: Date,
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}→{}", self.start, self.end)
    }
}

/// Split `[start, end]` into consecutive, non-overlapping windows of at most
/// `batch_days` days each, in date order.
pub fn partition_range(start: Date, end: Date, batch_days: u32) -> Vec<DateWindow> {
    let span = time::Duration::days(i64::from(batch_days.max(1)) - 1);
    let mut windows = Vec::new();
    let mut current = start;

    while current <= end {
        let window_end = current
            .checked_add(span)
            .map_or(end, |candidate| candidate.min(end));
        windows.push(DateWindow {
            start: current,
            end: window_end,
        });
        match window_end.next_day() {
            Some(next) => current = next,
            None => break,
        }
    }
    windows
}

/// Raw hourly records returned by the feed for one window.
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub station_id: String,
    pub window: DateWindow,
    pub records: Vec<Value>,
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("error sending request: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("error response from feed: {0}")]
    Status(StatusCode),
    #[error("error decoding feed body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("feed answered with status {0:?}")]
    NotOk(Option<String>),
    #[error("failed to format window date: {0}")]
    DateFormat(#[from] time::error::Format),
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub base_url: String,
    pub token: String,
    pub batch_days: u32,
    pub request_timeout: Duration,
    pub user_agent: String,
}

/// Client for the Infoclimat open-data observation feed.
///
/// Windows are fetched one after another with exactly one attempt each; a
/// failed window is logged and dropped.
pub struct InfoclimatClient {
    logger: Logger,
    client: Client,
    settings: FeedSettings,
}

impl InfoclimatClient {
    pub fn new(logger: Logger, settings: FeedSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            logger,
            client,
            settings,
        })
    }

    pub fn batch_days(&self) -> u32 {
        self.settings.batch_days
    }

    /// Fetch every window of `[start, end]` for `station_id`.
    ///
    /// Returns only the windows that produced records. An empty result can mean
    /// either "no data" or "every window failed"; the logs tell which.
    pub async fn fetch(&self, station_id: &str, start: Date, end: Date) -> Vec<RawBatch> {
        let windows = partition_range(start, end, self.settings.batch_days);
        let mut batches = Vec::with_capacity(windows.len());

        for window in windows {
            match self.fetch_window(station_id, window).await {
                Ok(Some(batch)) => {
                    info!(
                        self.logger,
                        "batch {}: {} hourly records",
                        window,
                        batch.records.len()
                    );
                    batches.push(batch);
                }
                Ok(None) => debug!(self.logger, "batch {}: no records", window),
                Err(e) => error!(self.logger, "batch {} for {} dropped: {}", window, station_id, e),
            }
        }

        info!(self.logger, "{} batches retrieved for {}", batches.len(), station_id);
        batches
    }

    pub async fn fetch_window(
        &self,
        station_id: &str,
        window: DateWindow,
    ) -> Result<Option<RawBatch>, FetchError> {
        let start = window.start.format(DATE_FORMAT)?;
        let end = window.end.format(DATE_FORMAT)?;

        debug!(self.logger, "requesting {} for {}", window, station_id);
        let response = self
            .client
            .get(&self.settings.base_url)
            .query(&[
                ("version", API_VERSION),
                ("method", API_METHOD),
                ("format", API_FORMAT),
                ("stations[]", station_id),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("token", self.settings.token.as_str()),
            ])
            .send()
            .await
            .map_err(FetchError::Transport)?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let mut body: Value = response.json().await.map_err(FetchError::Body)?;
        let status = body.get("status").and_then(Value::as_str);
        if status != Some("OK") {
            warn!(self.logger, "non-OK status for {}: {:?}", window, status);
            return Err(FetchError::NotOk(status.map(str::to_owned)));
        }

        let records = match body
            .get_mut("hourly")
            .and_then(|hourly| hourly.get_mut(station_id))
            .map(Value::take)
        {
            Some(Value::Array(records)) if !records.is_empty() => records,
            _ => return Ok(None),
        };

        Ok(Some(RawBatch {
            station_id: station_id.to_owned(),
            window,
            records,
        }))
    }
}
