//! Publisher API endpoints
//!
//! Publishers are shared between users; article links and counts are
//! always scoped to the caller's own articles.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::auth::MessageResponse;
use crate::api::error::AppError;
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::{Article, Publisher, PublisherWithArticles};

#[derive(Debug, Serialize)]
pub struct PublisherListResponse {
    pub data: Vec<Publisher>,
}

#[derive(Debug, Serialize)]
pub struct PublisherArticlesResponse {
    /// Publisher name
    pub publisher: String,
    pub count: usize,
    pub articles: Vec<Article>,
}

#[derive(Debug, Serialize)]
pub struct PublisherLinkResponse {
    pub message: String,
    pub publisher: Publisher,
}

#[derive(Debug, Default, Deserialize)]
pub struct PublisherNameRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LinkPublisherRequest {
    #[serde(default, rename = "publisherName")]
    pub publisher_name: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_publishers).post(create_publisher))
        .route("/search/{query}", get(search_publishers))
        .route("/article/{article_id}", post(link_publisher))
        .route(
            "/article/{article_id}/publisher/{publisher_id}",
            delete(unlink_publisher),
        )
        .route(
            "/{id}",
            get(get_publisher).put(rename_publisher).delete(delete_publisher),
        )
        .route("/{id}/articles", get(publisher_articles))
}

async fn list_publishers(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<PublisherListResponse>, AppError> {
    let data = state.publisher_service.list(user.id).await?;
    Ok(Json(PublisherListResponse { data }))
}

async fn get_publisher(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<PublisherWithArticles>, AppError> {
    Ok(Json(state.publisher_service.get_with_articles(id, user.id).await?))
}

async fn publisher_articles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<PublisherArticlesResponse>, AppError> {
    let found = state.publisher_service.get_with_articles(id, user.id).await?;
    Ok(Json(PublisherArticlesResponse {
        publisher: found.publisher.name,
        count: found.articles.len(),
        articles: found.articles,
    }))
}

/// 201 when the publisher was created, 200 when it already existed
async fn create_publisher(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(body): Json<PublisherNameRequest>,
) -> Result<(StatusCode, Json<Publisher>), AppError> {
    let (publisher, created) = state
        .publisher_service
        .find_or_create(body.name.as_deref())
        .await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(publisher)))
}

async fn rename_publisher(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<PublisherNameRequest>,
) -> Result<Json<Publisher>, AppError> {
    Ok(Json(state.publisher_service.rename(id, body.name.as_deref()).await?))
}

async fn delete_publisher(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.publisher_service.delete(id).await?;
    Ok(MessageResponse::new("Publisher deleted successfully"))
}

async fn link_publisher(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(article_id): Path<i64>,
    Json(body): Json<LinkPublisherRequest>,
) -> Result<Json<PublisherLinkResponse>, AppError> {
    let publisher = state
        .publisher_service
        .link_article(article_id, user.id, body.publisher_name.as_deref())
        .await?;
    Ok(Json(PublisherLinkResponse {
        message: "Publisher added to article".to_string(),
        publisher,
    }))
}

async fn unlink_publisher(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((article_id, publisher_id)): Path<(i64, i64)>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .publisher_service
        .unlink_article(article_id, user.id, publisher_id)
        .await?;
    Ok(MessageResponse::new("Publisher removed from article"))
}

async fn search_publishers(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(query): Path<String>,
) -> Result<Json<Vec<Publisher>>, AppError> {
    Ok(Json(state.publisher_service.search(&query).await?))
}
