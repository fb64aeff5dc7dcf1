//! Home button API endpoints
//!
//! - GET /v1/home-buttons?position=header|footer - Public list
//! - POST /v1/home-buttons, PUT/DELETE /v1/home-buttons/{id} - Require auth

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::error::AppError;
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::{HomeButton, HomeButtonInput};

#[derive(Debug, Default, Deserialize)]
pub struct PositionQuery {
    pub position: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_buttons))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_button))
        .route("/{id}", put(update_button).delete(delete_button))
}

async fn list_buttons(
    State(state): State<AppState>,
    Query(query): Query<PositionQuery>,
) -> Result<Json<Vec<HomeButton>>, AppError> {
    Ok(Json(state.home_button_service.list(query.position.as_deref()).await?))
}

async fn create_button(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(input): Json<HomeButtonInput>,
) -> Result<Json<HomeButton>, AppError> {
    Ok(Json(state.home_button_service.create(&input).await?))
}

async fn update_button(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(input): Json<HomeButtonInput>,
) -> Result<Json<HomeButton>, AppError> {
    Ok(Json(state.home_button_service.update(id, &input).await?))
}

async fn delete_button(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<OkResponse>, AppError> {
    state.home_button_service.delete(id).await?;
    Ok(Json(OkResponse { ok: true }))
}
