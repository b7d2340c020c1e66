use axum::{
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use daemon::{partition_range, FeedSettings, InfoclimatClient, IngestionService};
use rain_oracle_core::{NumericField, Store, TextField};
use serde_json::json;
use slog::Logger;
use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};
use time::macros::date;
use tokio::net::TcpListener;

const STATION: &str = "000BG";

/// Stand-in for the Infoclimat open-data endpoint, keyed on the window start.
async fn feed(Query(params): Query<HashMap<String, String>>) -> Response {
    if params.get("version").map(String::as_str) != Some("2")
        || params.get("method").map(String::as_str) != Some("get")
        || params.get("format").map(String::as_str) != Some("json")
        || params.get("stations[]").map(String::as_str) != Some(STATION)
        || params.get("token").map(String::as_str) != Some("secret")
    {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match params.get("start").map(String::as_str) {
        Some("2024-01-01") => Json(json!({
            "status": "OK",
            "hourly": {
                STATION: [
                    {
                        "id_station": STATION,
                        "dh_utc": "2024-01-01 00:00:00",
                        "temperature": "4.2",
                        "pression": "1018.3",
                        "humidite": "",
                        "pluie_1h": null,
                        "temps_omm": "61"
                    },
                    {
                        "dh_utc": "2024-01-02 13:00:00",
                        "temperature": 6.5,
                        "vent_rafales": "n/a"
                    },
                    { "temperature": "3.0" }
                ]
            }
        }))
        .into_response(),
        Some("2024-01-03") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some("2024-01-05") => Json(json!({ "status": "KO", "errors": ["quota"] })).into_response(),
        Some("2024-01-07") => (StatusCode::OK, "{ not json").into_response(),
        _ => Json(json!({ "status": "OK", "hourly": { STATION: [] } })).into_response(),
    }
}

async fn spawn_feed() -> String {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().route("/opendata", get(feed)))
            .await
            .unwrap();
    });
    format!("http://{}/opendata", addr)
}

fn discard() -> Logger {
    Logger::root(slog::Discard, slog::o!())
}

fn client(base_url: String, batch_days: u32) -> InfoclimatClient {
    InfoclimatClient::new(
        discard(),
        FeedSettings {
            base_url,
            token: "secret".to_string(),
            batch_days,
            request_timeout: Duration::from_secs(5),
            user_agent: "rain-oracle-tests".to_string(),
        },
    )
    .unwrap()
}

#[tokio::test]
async fn failed_windows_are_dropped_and_the_rest_continue() {
    let base_url = spawn_feed().await;
    let client = client(base_url, 2);

    let batches = client
        .fetch(STATION, date!(2024-01-01), date!(2024-01-10))
        .await;

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].window.start, date!(2024-01-01));
    assert_eq!(batches[0].window.end, date!(2024-01-02));
    assert_eq!(batches[0].station_id, STATION);
    assert_eq!(batches[0].records.len(), 3);
}

#[tokio::test]
async fn single_window_errors_are_classified() {
    let base_url = spawn_feed().await;
    let client = client(base_url, 2);
    let windows = partition_range(date!(2024-01-01), date!(2024-01-10), 2);
    assert_eq!(windows.len(), 5);

    assert!(client
        .fetch_window(STATION, windows[0])
        .await
        .unwrap()
        .is_some());
    assert!(matches!(
        client.fetch_window(STATION, windows[1]).await,
        Err(daemon::FetchError::Status(status)) if status.as_u16() == 500
    ));
    assert!(matches!(
        client.fetch_window(STATION, windows[2]).await,
        Err(daemon::FetchError::NotOk(Some(ref status))) if status == "KO"
    ));
    assert!(matches!(
        client.fetch_window(STATION, windows[3]).await,
        Err(daemon::FetchError::Body(_))
    ));
    assert!(client
        .fetch_window(STATION, windows[4])
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn unreachable_feed_yields_no_batches() {
    // nothing listens on the discard port
    let client = client("http://127.0.0.1:9/opendata".to_string(), 30);
    let batches = client
        .fetch(STATION, date!(2024-01-01), date!(2024-01-31))
        .await;
    assert!(batches.is_empty());
}

#[tokio::test]
async fn ingestion_normalises_and_upserts_idempotently() {
    let base_url = spawn_feed().await;
    let store = Store::in_memory(discard()).await.unwrap();
    let service = IngestionService::new(
        discard(),
        Arc::new(client(base_url, 2)),
        store.clone(),
    );

    let report = service
        .run(STATION, date!(2024-01-01), date!(2024-01-10))
        .await
        .unwrap();
    assert_eq!(report.windows, 5);
    assert_eq!(report.batches, 1);
    assert_eq!(report.records, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.written, 2);
    assert_eq!(store.count().await.unwrap(), 2);

    let first = store
        .get(STATION, "2024-01-01 00:00:00")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.get(NumericField::Temperature), Some(4.2));
    assert_eq!(first.get(NumericField::Pressure), Some(1018.3));
    assert_eq!(first.get(NumericField::Humidity), None);
    assert_eq!(first.get(NumericField::Rain1h), None);
    assert_eq!(first.text(TextField::WeatherCode), Some("61"));

    let second = store
        .get(STATION, "2024-01-02 13:00:00")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.get(NumericField::WindGust), None);

    // a second pass over the same range replaces rather than duplicates
    service
        .run(STATION, date!(2024-01-01), date!(2024-01-10))
        .await
        .unwrap();
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn empty_range_writes_nothing() {
    let base_url = spawn_feed().await;
    let store = Store::in_memory(discard()).await.unwrap();
    let service = IngestionService::new(discard(), Arc::new(client(base_url, 30)), store.clone());

    let report = service
        .run(STATION, date!(2024-02-01), date!(2024-02-20))
        .await
        .unwrap();
    assert_eq!(report.windows, 1);
    assert_eq!(report.batches, 0);
    assert_eq!(report.written, 0);
    assert_eq!(store.count().await.unwrap(), 0);
}
