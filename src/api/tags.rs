//! Tag API endpoints
//!
//! - GET /v1/tag/tags - All tags by name
//! - GET /v1/tag/{id}/articles - The caller's articles carrying a tag

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::error::AppError;
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::{Article, Tag};

#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<Tag>,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/tags", get(list_tags))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/{id}/articles", get(tag_articles))
}

async fn list_tags(State(state): State<AppState>) -> Result<Json<TagListResponse>, AppError> {
    let tags = state.tag_service.list().await?;
    Ok(Json(TagListResponse { tags }))
}

async fn tag_articles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Article>>, AppError> {
    Ok(Json(state.tag_service.articles(id, user.id).await?))
}
