use crate::helpers::{discard_logger, spawn_app, stub_predictor, MockSource};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use oracle::{FeaturePolicy, Predictor};
use rain_oracle_core::{Store, StoreError};
use serde_json::{from_slice, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn health_request() -> Request<Body> {
    Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn healthy_store_reports_ok() {
    let store = Store::in_memory(discard_logger()).await.unwrap();
    let test_app = spawn_app(
        Arc::new(store),
        Predictor::unavailable(),
        FeaturePolicy::DateMatched,
    )
    .await;

    let response = test_app
        .app
        .clone()
        .oneshot(health_request())
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let res: Value = from_slice(&body).unwrap();
    assert_eq!(res["store"], "ok");
    assert_eq!(res["model_loaded"], false);
    assert_eq!(res["feature_policy"], "date-matched");
}

#[tokio::test]
async fn failing_store_reports_unavailable() {
    let mut source = MockSource::new();
    source
        .expect_health_check()
        .times(1)
        .returning(|| Err(StoreError::Integrity("row 3 missing from index".to_string())));
    let test_app = spawn_app(
        Arc::new(source),
        stub_predictor(),
        FeaturePolicy::RecencyWeighted,
    )
    .await;

    let response = test_app
        .app
        .clone()
        .oneshot(health_request())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let res: Value = from_slice(&body).unwrap();
    assert_eq!(res["model_loaded"], true);
    assert!(res["store"].as_str().unwrap().contains("row 3"));
}
