//! Crossref lookup endpoint
//!
//! GET /v1/crossref/works/{doi} prefills the capture form from a DOI.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::error::AppError;
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::services::{clean_doi, ArticleDraft};

pub fn router() -> Router<AppState> {
    Router::new().route("/works/{*doi}", get(lookup_work))
}

async fn lookup_work(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(doi): Path<String>,
) -> Result<Json<ArticleDraft>, AppError> {
    let doi = clean_doi(&doi);
    if doi.is_empty() {
        return Err(AppError::bad_request("DOI is required"));
    }
    let work = state.crossref.fetch_work(&doi).await?;
    Ok(Json(work.draft))
}
