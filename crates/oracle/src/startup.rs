use crate::{
    health, oracle, predict_rain, predict_rain_query, routes, FeaturePolicy, Predictor,
    RainOracle,
};
use anyhow::anyhow;
use axum::{
    body::Body,
    extract::{Request, State},
    middleware::{self, Next},
    response::IntoResponse,
    routing::get,
    Router,
};
use hyper::{
    header::{ACCEPT, CONTENT_TYPE},
    Method,
};
use rain_oracle_core::{ObservationSource, Store};
use slog::{info, o, Logger};
use std::{path::Path, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

#[derive(Clone)]
pub struct AppState {
    pub logger: Logger,
    pub store: Arc<dyn ObservationSource>,
    pub oracle: Arc<RainOracle>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::predict::predict_rain,
        routes::predict::predict_rain_query,
        routes::health::health,
    ),
    components(
        schemas(
            oracle::PredictionResult,
            oracle::ErrorBody,
            oracle::Error,
            routes::predict::PredictRequest,
            routes::health::Health,
        )
    ),
    tags(
        (name = "rain oracle api", description = "a RESTful api predicting rain from recent Infoclimat station observations")
    )
)]
struct ApiDoc;

pub struct Settings<'a> {
    pub db_path: &'a str,
    pub imputer_path: &'a Path,
    pub model_path: &'a Path,
    pub policy: FeaturePolicy,
}

pub async fn build_app_state(logger: Logger, settings: Settings<'_>) -> Result<AppState, anyhow::Error> {
    let store = Store::new(settings.db_path, logger.new(o!("component" => "store")))
        .await
        .map_err(|e| anyhow!("error setting up SQLite database: {}", e))?;
    let store: Arc<dyn ObservationSource> = Arc::new(store);

    let predictor = Predictor::load(
        settings.imputer_path,
        settings.model_path,
        &logger.new(o!("component" => "model")),
    );

    Ok(app_state_from_parts(logger, store, predictor, settings.policy))
}

pub fn app_state_from_parts(
    logger: Logger,
    store: Arc<dyn ObservationSource>,
    predictor: Predictor,
    policy: FeaturePolicy,
) -> AppState {
    let oracle = Arc::new(RainOracle::new(
        logger.new(o!("component" => "oracle")),
        store.clone(),
        predictor,
        policy,
    ));
    AppState {
        logger,
        store,
        oracle,
    }
}

pub fn app(app_state: AppState) -> Router {
    let api_docs = ApiDoc::openapi();
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .allow_origin(Any);
    let state = Arc::new(app_state);

    Router::new()
        .route("/predict_rain", get(predict_rain_query).post(predict_rain))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(state.clone(), log_request))
        .with_state(state)
        .merge(Scalar::with_url("/docs", api_docs))
        .layer(cors)
}

async fn log_request(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let now = time::OffsetDateTime::now_utc();
    let method = request.method().clone();
    let path = request
        .uri()
        .path_and_query()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_default();
    info!(state.logger, "new request, {} {}", method.as_str(), path);

    let response = next.run(request).await;
    let response_time = time::OffsetDateTime::now_utc() - now;
    info!(
        state.logger,
        "response, {} {} code: {}, time: {}",
        method.as_str(),
        path,
        response.status().as_str(),
        response_time
    );

    response
}
