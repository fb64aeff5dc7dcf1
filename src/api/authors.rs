//! Author API endpoints
//!
//! Authors are not stored separately; they are derived from the free-text
//! `authors` column of the caller's articles.
//!
//! - GET /v1/authors (also /api/authors) - Authors with article counts
//! - GET /v1/authors/{name}/articles - Articles by one author

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::error::AppError;
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::Article;
use crate::services::AuthorSummary;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_authors))
        .route("/{name}/articles", get(author_articles))
}

async fn list_authors(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<AuthorSummary>>, AppError> {
    Ok(Json(state.author_service.list(user.id).await?))
}

/// `name` arrives percent-decoded
async fn author_articles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(name): Path<String>,
) -> Result<Json<Vec<Article>>, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Author name is required"));
    }
    Ok(Json(state.author_service.articles(user.id, name).await?))
}
