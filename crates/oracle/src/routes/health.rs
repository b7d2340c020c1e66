use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use slog::error;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;

#[derive(Serialize, Debug, ToSchema)]
pub struct Health {
    pub store: String,
    pub model_loaded: bool,
    pub feature_policy: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = OK, description = "Store is reachable and consistent", body = Health),
        (status = SERVICE_UNAVAILABLE, description = "Store check failed", body = Health)
    ))]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Health>) {
    let (status, store) = match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, "ok".to_string()),
        Err(e) => {
            error!(state.logger, "store health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    };
    (
        status,
        Json(Health {
            store,
            model_loaded: state.oracle.model_loaded(),
            feature_policy: state.oracle.policy().to_string(),
        }),
    )
}
