use async_trait::async_trait;
use axum::Router;
use mockall::mock;
use oracle::{
    app, app_state_from_parts, Classifier, FeaturePolicy, Imputer, ModelError, Predictor,
    RainOracle,
};
use rain_oracle_core::{Observation, ObservationSource, StoreError};
use slog::Logger;
use std::sync::Arc;
use time::Date;

mock! {
    pub Source {}

    #[async_trait]
    impl ObservationSource for Source {
        async fn recent_observations(&self, limit: u32) -> Result<Vec<Observation>, StoreError>;
        async fn observation_on(&self, date: Date) -> Result<Option<Observation>, StoreError>;
        async fn health_check(&self) -> Result<(), StoreError>;
    }
}

/// Says rain whenever the gust feature is positive.
///
/// `rain_1h` is not one of the eight model inputs, so rainy hours in these
/// tests also carry a gust and the gust column stands in for rain.
pub struct GustProxy;

impl Classifier for GustProxy {
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError> {
        Ok(if features[5] > 0.0 { 0.912345678 } else { 0.1 })
    }
}

pub fn discard_logger() -> Logger {
    Logger::root(slog::Discard, slog::o!())
}

pub fn passthrough_imputer() -> Imputer {
    Imputer {
        strategy: "median".to_string(),
        statistics: vec![0.0; 8],
        missing_values: None,
    }
}

pub fn stub_predictor() -> Predictor {
    Predictor::new(passthrough_imputer(), Box::new(GustProxy))
}

pub struct TestApp {
    pub app: Router,
    pub oracle: Arc<RainOracle>,
}

pub async fn spawn_app(
    source: Arc<dyn ObservationSource>,
    predictor: Predictor,
    policy: FeaturePolicy,
) -> TestApp {
    let state = app_state_from_parts(discard_logger(), source, predictor, policy);
    let oracle = state.oracle.clone();

    TestApp {
        app: app(state),
        oracle,
    }
}
