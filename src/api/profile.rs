//! Profile API endpoints
//!
//! - GET /v1/profile - Current user's profile
//! - PUT /v1/profile - Update the supplied profile fields

use axum::{extract::State, routing::get, Json, Router};

use crate::api::error::AppError;
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::{UpdateProfileInput, User};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_profile).put(update_profile))
}

async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.user_service.get_by_id(user.id).await?))
}

/// Fields missing from the body are left unchanged; unknown keys are ignored
async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<UpdateProfileInput>,
) -> Result<Json<User>, AppError> {
    let updated = state.user_service.update_profile(user.id, input).await?;
    tracing::info!(user_id = user.id, "Profile updated");
    Ok(Json(updated))
}
