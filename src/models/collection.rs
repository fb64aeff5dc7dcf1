//! Collection model
//!
//! A collection is a user-named group of that user's own articles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Article;

/// Collection with its article count
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Collection {
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub collection_name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "articleCount")]
    pub article_count: i64,
}

/// Collection together with its member articles
#[derive(Debug, Clone, Serialize)]
pub struct CollectionWithArticles {
    #[serde(flatten)]
    pub collection: Collection,
    pub articles: Vec<Article>,
}

/// Body of create and rename requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionNameInput {
    #[serde(default, alias = "collection_name")]
    pub name: Option<String>,
}

/// Result of assigning articles to a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignOutcome {
    pub assigned_count: usize,
    pub total_requested: usize,
}
