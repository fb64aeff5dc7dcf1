//! Liveness endpoints

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::api::error::AppError;
use crate::api::middleware::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(ok))
        .route("/v1/health", get(ok))
        .route("/v1/error-test", get(error_test))
}

async fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Always fails; lets clients check how errors are rendered
async fn error_test() -> Result<Json<Value>, AppError> {
    Err(AppError::Unauthorized("Invalid token".to_string()))
}
