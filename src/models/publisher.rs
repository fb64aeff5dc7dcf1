//! Publisher model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Article;

/// Publisher entity; `article_count` only counts the caller's articles
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Publisher {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(default)]
    #[serde(default)]
    pub article_count: i64,
}

/// Publisher with the caller's linked articles
#[derive(Debug, Clone, Serialize)]
pub struct PublisherWithArticles {
    #[serde(flatten)]
    pub publisher: Publisher,
    pub articles: Vec<Article>,
}
