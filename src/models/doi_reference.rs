//! DOI reference model
//!
//! Stores the reference list of a work, keyed by its cleaned DOI. The list
//! is kept as raw JSON text and parsed on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DoiReference {
    pub id: i64,
    pub doi: String,
    /// Raw JSON text as stored
    #[serde(skip)]
    pub references_json: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl DoiReference {
    /// Stored references, or `None` when absent or not valid JSON
    pub fn references(&self) -> Option<serde_json::Value> {
        self.references_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

/// Wire form with parsed references
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoiReferenceView {
    pub id: i64,
    pub doi: String,
    pub references: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<DoiReference> for DoiReferenceView {
    fn from(record: DoiReference) -> Self {
        Self {
            references: record.references(),
            id: record.id,
            doi: record.doi,
            created_at: record.created_at,
        }
    }
}

/// Outcome of storing references for a DOI
#[derive(Debug, Clone, PartialEq)]
pub enum SaveReferencesOutcome {
    /// A row already existed and was left untouched
    Existing,
    Created { id: i64, references_count: usize },
}
