//! Crossref works API client
//!
//! Turns a DOI into an article draft for the capture form. Successful lookups
//! are cached in process; misses and upstream failures are not.

use crate::cache::{CacheLayer, MemoryCache};
use crate::config::CrossrefConfig;
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

#[derive(Debug, thiserror::Error)]
pub enum CrossrefError {
    #[error("DOI not found")]
    NotFound,

    #[error("Crossref request failed: {0}")]
    Upstream(String),
}

/// Article fields prefilled from Crossref metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDraft {
    pub doi: String,
    pub title: Option<String>,
    /// Author names joined with ", "
    pub authors: Option<String>,
    pub journal: Option<String>,
    pub publisher: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub url: Option<String>,
    pub year: Option<i64>,
    pub reference_count: Option<i64>,
}

/// A fetched work: the draft plus its raw reference list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossrefWork {
    pub draft: ArticleDraft,
    pub references: Vec<Value>,
}

#[derive(Deserialize)]
struct WorksResponse {
    message: WorkMessage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkMessage {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    title: Vec<String>,
    author: Vec<WorkAuthor>,
    #[serde(rename = "container-title")]
    container_title: Vec<String>,
    publisher: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    issued: Option<WorkDate>,
    #[serde(rename = "reference-count")]
    reference_count: Option<i64>,
    reference: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkAuthor {
    given: Option<String>,
    family: Option<String>,
    /// Organisational authors only have a name
    name: Option<String>,
}

impl WorkAuthor {
    fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.given.as_deref(), self.family.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(str::to_string)
        } else {
            Some(parts.join(" "))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkDate {
    #[serde(rename = "date-parts")]
    date_parts: Vec<Vec<Option<i64>>>,
}

pub struct CrossrefClient {
    http: reqwest::Client,
    base_url: String,
    cache: Arc<MemoryCache>,
    cache_ttl: Duration,
}

impl CrossrefClient {
    pub fn new(config: &CrossrefConfig, cache: Arc<MemoryCache>) -> anyhow::Result<Self> {
        let user_agent = match config.mailto.as_deref() {
            Some(mailto) if !mailto.is_empty() => {
                format!("ResearchLocker/{} (mailto:{})", env!("CARGO_PKG_VERSION"), mailto)
            }
            _ => format!("ResearchLocker/{}", env!("CARGO_PKG_VERSION")),
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(user_agent)
            .build()
            .context("Failed to build Crossref HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache,
            cache_ttl: Duration::from_secs(config.cache_ttl_seconds),
        })
    }

    /// Look up a work by (already cleaned) DOI
    pub async fn fetch_work(&self, doi: &str) -> Result<CrossrefWork, CrossrefError> {
        let key = format!("crossref:{}", doi.to_lowercase());
        match self.cache.get::<CrossrefWork>(&key).await {
            Ok(Some(work)) => return Ok(work),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable Crossref cache entry"),
        }

        let url = format!("{}/works/{}", self.base_url, urlencoding::encode(doi));
        let response = self.http.get(&url).send().await.map_err(|e| {
            tracing::warn!(doi = %doi, error = %e, "Crossref request failed");
            CrossrefError::Upstream(e.to_string())
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(CrossrefError::NotFound),
            status if !status.is_success() => {
                tracing::warn!(doi = %doi, status = %status, "Crossref returned an error status");
                return Err(CrossrefError::Upstream(format!("status {}", status)));
            }
            _ => {}
        }

        let body: WorksResponse = response
            .json()
            .await
            .map_err(|e| CrossrefError::Upstream(format!("invalid response: {}", e)))?;
        let work = into_work(doi, body.message);

        if let Err(e) = self.cache.set(&key, &work, self.cache_ttl).await {
            tracing::warn!(error = %e, "Failed to cache Crossref work");
        }
        Ok(work)
    }
}

fn into_work(requested_doi: &str, message: WorkMessage) -> CrossrefWork {
    let authors: Vec<String> = message.author.iter().filter_map(WorkAuthor::display_name).collect();
    let year = message
        .issued
        .as_ref()
        .and_then(|issued| issued.date_parts.first())
        .and_then(|parts| parts.first().copied().flatten());

    let draft = ArticleDraft {
        doi: message.doi.unwrap_or_else(|| requested_doi.to_string()),
        title: first_non_empty(message.title),
        authors: (!authors.is_empty()).then(|| authors.join(", ")),
        journal: first_non_empty(message.container_title),
        publisher: message.publisher.filter(|p| !p.trim().is_empty()),
        abstract_text: message.abstract_text.as_deref().map(strip_markup).filter(|a| !a.is_empty()),
        url: message.url,
        year,
        reference_count: message.reference_count,
    };

    CrossrefWork {
        draft,
        references: message.reference,
    }
}

fn first_non_empty(values: Vec<String>) -> Option<String> {
    values
        .into_iter()
        .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|v| !v.is_empty())
}

/// Abstracts come as JATS XML; keep the text only
fn strip_markup(text: &str) -> String {
    let stripped = MARKUP_TAG.replace_all(text, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
