//! DOI reference API endpoints
//!
//! - POST /v1/doi-references - Store a reference list (write-once per DOI)
//! - POST /v1/doi-references/import - Fetch references from Crossref and store them
//! - GET /v1/doi-references - Paginated list, newest first
//! - GET /v1/doi-references/{doi} - One DOI; the DOI may contain `/`

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::error::AppError;
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::{DoiReferenceView, ListParams, SaveReferencesOutcome};

#[derive(Debug, Default, Deserialize)]
pub struct SaveReferencesRequest {
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub references: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub doi: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReferencesResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub existing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references_count: Option<usize>,
}

impl From<SaveReferencesOutcome> for SaveReferencesResponse {
    fn from(outcome: SaveReferencesOutcome) -> Self {
        match outcome {
            SaveReferencesOutcome::Existing => Self {
                message: "DOI already exists, references not updated".to_string(),
                id: None,
                existing: true,
                references_count: None,
            },
            SaveReferencesOutcome::Created { id, references_count } => Self {
                message: "DOI references saved successfully".to_string(),
                id: Some(id),
                existing: false,
                references_count: Some(references_count),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: u32,
}

#[derive(Debug, Serialize)]
pub struct DoiReferenceListResponse {
    pub data: Vec<DoiReferenceView>,
    pub pagination: Pagination,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_references).post(save_references))
        .route("/import", post(import_references))
        .route("/{*doi}", get(get_references))
}

async fn save_references(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(body): Json<SaveReferencesRequest>,
) -> Result<Json<SaveReferencesResponse>, AppError> {
    let outcome = state
        .doi_reference_service
        .save(body.doi.as_deref(), body.references.as_ref())
        .await?;
    Ok(Json(outcome.into()))
}

async fn import_references(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(body): Json<ImportRequest>,
) -> Result<Json<SaveReferencesResponse>, AppError> {
    let outcome = state
        .doi_reference_service
        .import(body.doi.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

async fn get_references(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(doi): Path<String>,
) -> Result<Json<DoiReferenceView>, AppError> {
    Ok(Json(state.doi_reference_service.get(&doi).await?))
}

async fn list_references(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<DoiReferenceListResponse>, AppError> {
    let params = ListParams::new(query.page, query.limit);
    let result = state.doi_reference_service.list(params).await?;
    let total_pages = result.total_pages();
    Ok(Json(DoiReferenceListResponse {
        pagination: Pagination {
            page: result.page,
            limit: result.limit,
            total: result.total,
            total_pages,
        },
        data: result.items,
    }))
}
