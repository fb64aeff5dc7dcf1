//! DOI reference store
//!
//! Reference lists are stored once per DOI and never overwritten.

use crate::db::repositories::DoiReferenceRepository;
use crate::models::{DoiReferenceView, ListParams, PagedResult, SaveReferencesOutcome};
use crate::services::crossref::{CrossrefClient, CrossrefError};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

static DOI_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(https?://(dx\.)?doi\.org/|doi:\s*)").expect("DOI prefix pattern is valid")
});

/// Strip resolver URL and `doi:` prefixes from a DOI
pub fn clean_doi(doi: &str) -> String {
    let mut doi = doi.trim().to_string();
    loop {
        let stripped = DOI_PREFIX.replace(&doi, "").trim().to_string();
        if stripped == doi {
            return doi;
        }
        doi = stripped;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DoiReferenceServiceError {
    #[error("DOI is required")]
    DoiRequired,

    #[error("DOI references not found")]
    NotFound,

    #[error(transparent)]
    Crossref(#[from] CrossrefError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct DoiReferenceService {
    repo: Arc<dyn DoiReferenceRepository>,
    crossref: Arc<CrossrefClient>,
}

impl DoiReferenceService {
    pub fn new(repo: Arc<dyn DoiReferenceRepository>, crossref: Arc<CrossrefClient>) -> Self {
        Self { repo, crossref }
    }

    /// Store references for a DOI unless the DOI is already known
    pub async fn save(
        &self,
        doi: Option<&str>,
        references: Option<&Value>,
    ) -> Result<SaveReferencesOutcome, DoiReferenceServiceError> {
        let doi = doi.map(clean_doi).unwrap_or_default();
        if doi.is_empty() {
            return Err(DoiReferenceServiceError::DoiRequired);
        }

        if self.repo.get_by_doi(&doi).await?.is_some() {
            return Ok(SaveReferencesOutcome::Existing);
        }

        let references = references.filter(|value| !value.is_null());
        let json = references
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to encode references")?;

        match self.repo.insert_if_absent(&doi, json.as_deref()).await? {
            Some(id) => {
                let references_count = references.map(reference_count).unwrap_or(0);
                tracing::info!(doi = %doi, references_count, "DOI references saved");
                Ok(SaveReferencesOutcome::Created { id, references_count })
            }
            // Another request stored the same DOI in between
            None => Ok(SaveReferencesOutcome::Existing),
        }
    }

    pub async fn get(&self, doi: &str) -> Result<DoiReferenceView, DoiReferenceServiceError> {
        let doi = clean_doi(doi);
        self.repo
            .get_by_doi(&doi)
            .await?
            .map(DoiReferenceView::from)
            .ok_or(DoiReferenceServiceError::NotFound)
    }

    /// Newest first
    pub async fn list(&self, params: ListParams) -> Result<PagedResult<DoiReferenceView>, DoiReferenceServiceError> {
        let records = self.repo.list(&params).await?;
        let total = self.repo.count().await?;
        let items = records.into_iter().map(DoiReferenceView::from).collect();
        Ok(PagedResult::new(items, total, &params))
    }

    /// Fetch the reference list from Crossref and store it
    pub async fn import(&self, doi: Option<&str>) -> Result<SaveReferencesOutcome, DoiReferenceServiceError> {
        let doi = doi.map(clean_doi).unwrap_or_default();
        if doi.is_empty() {
            return Err(DoiReferenceServiceError::DoiRequired);
        }
        if self.repo.get_by_doi(&doi).await?.is_some() {
            return Ok(SaveReferencesOutcome::Existing);
        }

        let work = self.crossref.fetch_work(&doi).await?;
        let references = Value::Array(work.references);
        self.save(Some(doi.as_str()), Some(&references)).await
    }
}

fn reference_count(references: &Value) -> usize {
    match references {
        Value::Array(items) => items.len(),
        Value::Null => 0,
        _ => 1,
    }
}
