//! Collection API endpoints
//!
//! Handles HTTP requests for the caller's collections:
//! - GET /v1/collections - List collections with article counts
//! - POST /v1/collections - Create a collection
//! - GET /v1/collections/{id} - Collection with its articles
//! - PUT /v1/collections/{id} - Rename
//! - DELETE /v1/collections/{id} - Delete (articles are kept)
//! - POST /v1/collections/{id}/articles - Assign articles
//! - DELETE /v1/collections/{id}/articles/{articleId} - Unassign one article
//! - GET /v1/collections/{id}/available-articles - Articles not yet assigned

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
use crate::models::{Article, Collection, CollectionNameInput, CollectionWithArticles};

#[derive(Debug, Serialize)]
pub struct CollectionListResponse {
    pub collections: Vec<Collection>,
}

#[derive(Debug, Serialize)]
pub struct CollectionResponse<T> {
    pub collection: T,
}

#[derive(Debug, Serialize)]
pub struct CollectionChangedResponse {
    pub message: String,
    pub collection: Collection,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignRequest {
    #[serde(default, rename = "articleIds")]
    pub article_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    pub message: String,
    pub assigned_count: usize,
    pub total_requested: usize,
}

#[derive(Debug, Serialize)]
pub struct ArticleListResponse {
    pub articles: Vec<Article>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_collections).post(create_collection))
        .route(
            "/{id}",
            get(get_collection).put(rename_collection).delete(delete_collection),
        )
        .route("/{id}/articles", post(assign_articles))
        .route("/{id}/articles/{article_id}", delete(unassign_article))
        .route("/{id}/available-articles", get(available_articles))
}

async fn list_collections(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<CollectionListResponse>, AppError> {
    let collections = state.collection_service.list(user.id).await?;
    Ok(Json(CollectionListResponse { collections }))
}

async fn create_collection(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<CollectionNameInput>,
) -> Result<(StatusCode, Json<CollectionChangedResponse>), AppError> {
    let collection = state
        .collection_service
        .create(user.id, input.name.as_deref())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CollectionChangedResponse {
            message: "Collection created successfully".to_string(),
            collection,
        }),
    ))
}

async fn get_collection(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<CollectionResponse<CollectionWithArticles>>, AppError> {
    let collection = state.collection_service.get(id, user.id).await?;
    Ok(Json(CollectionResponse { collection }))
}

async fn rename_collection(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(input): Json<CollectionNameInput>,
) -> Result<Json<CollectionChangedResponse>, AppError> {
    let collection = state
        .collection_service
        .rename(id, user.id, input.name.as_deref())
        .await?;
    Ok(Json(CollectionChangedResponse {
        message: "Collection updated successfully".to_string(),
        collection,
    }))
}

async fn delete_collection(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.collection_service.delete(id, user.id).await?;
    Ok(MessageResponse::new("Collection deleted successfully"))
}

/// Ids already in the collection count as requested but not assigned
async fn assign_articles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<AssignRequest>,
) -> Result<Json<AssignResponse>, AppError> {
    let outcome = state
        .collection_service
        .assign(id, user.id, &body.article_ids)
        .await?;
    Ok(Json(AssignResponse {
        message: format!("{} articles assigned to collection", outcome.assigned_count),
        assigned_count: outcome.assigned_count,
        total_requested: outcome.total_requested,
    }))
}

async fn unassign_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, article_id)): Path<(i64, i64)>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .collection_service
        .unassign(id, user.id, article_id)
        .await?;
    Ok(MessageResponse::new("Article removed from collection successfully"))
}

async fn available_articles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ArticleListResponse>, AppError> {
    let articles = state
        .collection_service
        .available_articles(id, user.id)
        .await?;
    Ok(Json(ArticleListResponse { articles }))
}
