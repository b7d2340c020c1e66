use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use rain_oracle_core::observation::DATE_FORMAT;
use serde::Deserialize;
use std::sync::Arc;
use time::Date;
use utoipa::{IntoParams, ToSchema};

use crate::{oracle::Error, AppState, PredictionResult};

#[derive(Deserialize, Debug, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PredictRequest {
    /// Target calendar date, YYYY-MM-DD
    pub date: String,
}

pub fn parse_request_date(raw: &str) -> Result<Date, Error> {
    Date::parse(raw.trim(), DATE_FORMAT).map_err(|_| Error::InvalidDateFormat(raw.to_string()))
}

#[utoipa::path(
    post,
    path = "/predict_rain",
    request_body = PredictRequest,
    responses(
        (status = OK, description = "Rain prediction for the requested date", body = PredictionResult),
        (status = BAD_REQUEST, description = "Date is not YYYY-MM-DD", body = crate::oracle::ErrorBody),
        (status = NOT_FOUND, description = "No qualifying observation is stored", body = crate::oracle::ErrorBody),
        (status = SERVICE_UNAVAILABLE, description = "Model or imputer failed to load", body = crate::oracle::ErrorBody),
        (status = INTERNAL_SERVER_ERROR, description = "Failed to read observations", body = crate::oracle::ErrorBody)
    ))]
pub async fn predict_rain(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, Error> {
    let Json(request) = body.map_err(|e| Error::InvalidDateFormat(e.body_text()))?;
    let date = parse_request_date(&request.date)?;
    state.oracle.predict(date).await.map(Json)
}

#[utoipa::path(
    get,
    path = "/predict_rain",
    params(PredictRequest),
    responses(
        (status = OK, description = "Rain prediction for the requested date", body = PredictionResult),
        (status = BAD_REQUEST, description = "Date is missing or not YYYY-MM-DD", body = crate::oracle::ErrorBody),
        (status = NOT_FOUND, description = "No qualifying observation is stored", body = crate::oracle::ErrorBody),
        (status = SERVICE_UNAVAILABLE, description = "Model or imputer failed to load", body = crate::oracle::ErrorBody)
    ))]
pub async fn predict_rain_query(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PredictRequest>, QueryRejection>,
) -> Result<Json<PredictionResult>, Error> {
    let Query(request) = query.map_err(|e| Error::InvalidDateFormat(e.body_text()))?;
    let date = parse_request_date(&request.date)?;
    state.oracle.predict(date).await.map(Json)
}
