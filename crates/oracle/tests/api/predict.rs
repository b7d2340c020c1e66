use crate::helpers::{discard_logger, spawn_app, stub_predictor, MockSource};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
};
use hyper::{header, Method};
use oracle::{FeaturePolicy, PredictionResult, Predictor};
use rain_oracle_core::{NumericField, Observation, Store};
use serde_json::{from_slice, json, Value};
use std::sync::Arc;
use time::macros::date;
use tower::ServiceExt;

fn hourly(ts: &str, temperature: f64) -> Observation {
    Observation::new("000BG", ts)
        .with(NumericField::Temperature, temperature)
        .with(NumericField::Humidity, 81.0)
        .with(NumericField::Pressure, 1012.4)
        .with(NumericField::Rain1h, 0.0)
}

/// Five hours with rising temperature; only the newest carries rain and gusts.
fn five_hours() -> Vec<Observation> {
    vec![
        hourly("2026-01-12 10:00:00", 10.0),
        hourly("2026-01-12 11:00:00", 11.0),
        hourly("2026-01-12 12:00:00", 12.0),
        hourly("2026-01-12 13:00:00", 13.0),
        hourly("2026-01-12 14:00:00", 14.0)
            .with(NumericField::Rain1h, 2.0)
            .with(NumericField::WindGust, 40.0)
            .with(NumericField::Humidity, 93.26),
    ]
}

fn post_date(date: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/predict_rain")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "date": date }).to_string()))
        .unwrap()
}

fn get_uri(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    from_slice(&body).unwrap()
}

#[tokio::test]
async fn recent_rainy_hour_predicts_rain_end_to_end() {
    let store = Store::in_memory(discard_logger()).await.unwrap();
    assert_eq!(store.upsert(five_hours()).await.unwrap(), 5);
    let test_app = spawn_app(
        Arc::new(store),
        stub_predictor(),
        FeaturePolicy::RecencyWeighted,
    )
    .await;

    let response = test_app
        .app
        .clone()
        .oneshot(post_date("2026-01-13"))
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let res: PredictionResult = from_slice(&body).unwrap();
    assert_eq!(
        res,
        PredictionResult {
            date: "2026-01-13".to_string(),
            rain_probability: 0.91235,
            will_rain: true,
            reference_temperature: 14.0,
            reference_humidity: 93.3,
        }
    );
}

#[tokio::test]
async fn get_and_post_answer_the_same() {
    let store = Store::in_memory(discard_logger()).await.unwrap();
    store.upsert(five_hours()).await.unwrap();
    let test_app = spawn_app(
        Arc::new(store),
        stub_predictor(),
        FeaturePolicy::RecencyWeighted,
    )
    .await;

    let via_post = test_app
        .app
        .clone()
        .oneshot(post_date("2026-01-12"))
        .await
        .unwrap();
    let via_get = test_app
        .app
        .clone()
        .oneshot(get_uri("/predict_rain?date=2026-01-12"))
        .await
        .unwrap();

    assert_eq!(via_post.status(), StatusCode::OK);
    assert_eq!(via_get.status(), StatusCode::OK);
    assert_eq!(json_body(via_post).await, json_body(via_get).await);
}

#[tokio::test]
async fn fewer_than_five_observations_is_not_found() {
    let mut source = MockSource::new();
    source
        .expect_recent_observations()
        .withf(|limit| *limit == 5)
        .times(1)
        .returning(|_| Ok(five_hours().into_iter().rev().take(3).collect()));
    let test_app = spawn_app(
        Arc::new(source),
        stub_predictor(),
        FeaturePolicy::RecencyWeighted,
    )
    .await;

    let response = test_app
        .app
        .clone()
        .oneshot(post_date("2026-01-12"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("found 3"));
}

#[tokio::test]
async fn missing_model_is_service_unavailable() {
    let mut source = MockSource::new();
    source.expect_recent_observations().times(0);
    let test_app = spawn_app(
        Arc::new(source),
        Predictor::unavailable(),
        FeaturePolicy::RecencyWeighted,
    )
    .await;

    let response = test_app
        .app
        .clone()
        .oneshot(post_date("2026-01-12"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["error"], "prediction model unavailable");
}

#[tokio::test]
async fn malformed_dates_are_bad_requests() {
    let test_app = spawn_app(
        Arc::new(MockSource::new()),
        stub_predictor(),
        FeaturePolicy::RecencyWeighted,
    )
    .await;

    for request in [
        post_date("12/01/2026"),
        post_date("2026-02-30"),
        get_uri("/predict_rain?date=tomorrow"),
        get_uri("/predict_rain"),
        Request::builder()
            .method(Method::POST)
            .uri("/predict_rain")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"day\": 3"))
            .unwrap(),
    ] {
        let response = test_app.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }
}

#[tokio::test]
async fn date_matched_policy_falls_back_to_previous_day() {
    let mut source = MockSource::new();
    source
        .expect_observation_on()
        .withf(|d| *d == date!(2026-01-13))
        .times(1)
        .returning(|_| Ok(None));
    source
        .expect_observation_on()
        .withf(|d| *d == date!(2026-01-12))
        .times(1)
        .returning(|_| {
            Ok(Some(
                Observation::new("000BG", "2026-01-12 23:00:00")
                    .with(NumericField::Temperature, 6.44)
                    .with(NumericField::Humidity, 88.0),
            ))
        });
    let test_app = spawn_app(
        Arc::new(source),
        stub_predictor(),
        FeaturePolicy::DateMatched,
    )
    .await;

    let response = test_app
        .app
        .clone()
        .oneshot(get_uri("/predict_rain?date=2026-01-13"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let res: PredictionResult = from_slice(&body).unwrap();
    assert_eq!(res.date, "2026-01-13");
    assert_eq!(res.reference_temperature, 6.4);
    assert_eq!(res.reference_humidity, 88.0);
    // no gust on the matched record
    assert!(!res.will_rain);
    assert_eq!(res.rain_probability, 0.1);
}

#[tokio::test]
async fn date_matched_policy_without_data_is_not_found() {
    let mut source = MockSource::new();
    source
        .expect_observation_on()
        .times(2)
        .returning(|_| Ok(None));
    let test_app = spawn_app(
        Arc::new(source),
        stub_predictor(),
        FeaturePolicy::DateMatched,
    )
    .await;

    let response = test_app
        .app
        .clone()
        .oneshot(post_date("2026-01-13"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oracle_can_be_called_directly() {
    let store = Store::in_memory(discard_logger()).await.unwrap();
    store.upsert(five_hours()).await.unwrap();
    let test_app = spawn_app(Arc::new(store), stub_predictor(), FeaturePolicy::DateMatched).await;

    let res = test_app.oracle.predict(date!(2026-01-12)).await.unwrap();
    // latest hour of the day is the rainy one
    assert!(res.will_rain);
    assert_eq!(res.reference_temperature, 14.0);
}
