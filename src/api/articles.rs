//! Article API endpoints
//!
//! Handles HTTP requests for the signed-in user's library:
//! - GET /v1/articles - List articles, newest first
//! - POST /v1/articles - Save a new article (plan limit applies)
//! - GET /v1/articles/library-info - Plan usage
//! - GET /v1/articles/{id} - Get one article
//! - PUT /v1/articles/{id} - Update an article
//! - DELETE /v1/articles/{id} - Delete an article
//! - GET /v1/articles/{id}/summary - Normalized summary

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::auth::MessageResponse;
use crate::api::error::AppError;
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::{Article, ArticleInput, LibraryInfo};
use crate::services::NormalizedSummary;

/// Build the articles router (all routes require auth)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_articles).post(create_article))
        .route("/library-info", get(library_info))
        .route(
            "/{id}",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route("/{id}/summary", get(get_summary))
}

/// GET /v1/articles
async fn list_articles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Article>>, AppError> {
    Ok(Json(state.article_service.list(user.id).await?))
}

/// POST /v1/articles
async fn create_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<ArticleInput>,
) -> Result<Json<Article>, AppError> {
    Ok(Json(state.article_service.create(user.id, input).await?))
}

/// GET /v1/articles/library-info
async fn library_info(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<LibraryInfo>, AppError> {
    Ok(Json(state.article_service.library_info(user.id).await?))
}

async fn get_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Article>, AppError> {
    Ok(Json(state.article_service.get(id, user.id).await?))
}

async fn update_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(input): Json<ArticleInput>,
) -> Result<Json<Article>, AppError> {
    Ok(Json(state.article_service.update(id, user.id, input).await?))
}

async fn delete_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.article_service.delete(id, user.id).await?;
    Ok(MessageResponse::new("Article deleted"))
}

/// GET /v1/articles/{id}/summary
async fn get_summary(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<NormalizedSummary>, AppError> {
    Ok(Json(state.article_service.summary(id, user.id).await?))
}
