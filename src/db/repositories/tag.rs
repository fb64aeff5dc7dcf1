//! Tag repository
//!
//! Database operations for tags and their links to articles.
//!
//! This module provides:
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL

use crate::db::DynDatabasePool;
use crate::models::Tag;
use crate::on_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use super::{insert_ignore, placeholders};

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// All tags ordered by name
    async fn list(&self) -> Result<Vec<Tag>>;

    /// Get tag by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// Get tag by exact name
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// Return the tag with this name, creating it if needed
    async fn find_or_create(&self, name: &str) -> Result<Tag>;

    /// Link a tag to an article; linking twice is a no-op
    async fn add_to_article(&self, tag_id: i64, article_id: i64) -> Result<()>;

    /// Remove every tag link of an article
    async fn clear_article(&self, article_id: i64) -> Result<()>;

    /// Tags of one article, by name
    async fn get_by_article_id(&self, article_id: i64) -> Result<Vec<Tag>>;

    /// `(article_id, tag)` pairs for a batch of articles
    async fn get_for_articles(&self, article_ids: &[i64]) -> Result<Vec<(i64, Tag)>>;
}

/// SQLx-based tag repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn list(&self) -> Result<Vec<Tag>> {
        let tags = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY name ASC")
                .fetch_all(pool)
                .await
        })
        .context("Failed to list tags")?;
        Ok(tags)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        let tag = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
        })
        .context("Failed to get tag by ID")?;
        Ok(tag)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let tag = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = ?")
                .bind(name)
                .fetch_optional(pool)
                .await
        })
        .context("Failed to get tag by name")?;
        Ok(tag)
    }

    async fn find_or_create(&self, name: &str) -> Result<Tag> {
        let sql = format!(
            "{} INTO tags (name, created_at) VALUES (?, ?)",
            insert_ignore(self.pool.driver())
        );
        on_pool!(self.pool, |pool| {
            sqlx::query(&sql)
                .bind(name)
                .bind(Utc::now())
                .execute(pool)
                .await
                .map(|_| ())
        })
        .context("Failed to create tag")?;

        self.get_by_name(name)
            .await?
            .with_context(|| format!("Tag '{}' missing after insert", name))
    }

    async fn add_to_article(&self, tag_id: i64, article_id: i64) -> Result<()> {
        let sql = format!(
            "{} INTO article_tags (article_id, tag_id) VALUES (?, ?)",
            insert_ignore(self.pool.driver())
        );
        on_pool!(self.pool, |pool| {
            sqlx::query(&sql)
                .bind(article_id)
                .bind(tag_id)
                .execute(pool)
                .await
                .map(|_| ())
        })
        .context("Failed to link tag to article")?;
        Ok(())
    }

    async fn clear_article(&self, article_id: i64) -> Result<()> {
        on_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
                .bind(article_id)
                .execute(pool)
                .await
                .map(|_| ())
        })
        .context("Failed to clear article tags")?;
        Ok(())
    }

    async fn get_by_article_id(&self, article_id: i64) -> Result<Vec<Tag>> {
        let tags = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Tag>(
                r#"
                SELECT t.id, t.name FROM tags t
                INNER JOIN article_tags atg ON atg.tag_id = t.id
                WHERE atg.article_id = ?
                ORDER BY t.name ASC
                "#,
            )
            .bind(article_id)
            .fetch_all(pool)
            .await
        })
        .context("Failed to get tags for article")?;
        Ok(tags)
    }

    async fn get_for_articles(&self, article_ids: &[i64]) -> Result<Vec<(i64, Tag)>> {
        if article_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT atg.article_id, t.id, t.name FROM tags t
            INNER JOIN article_tags atg ON atg.tag_id = t.id
            WHERE atg.article_id IN ({})
            ORDER BY t.name ASC
            "#,
            placeholders(article_ids.len())
        );
        let rows = on_pool!(self.pool, |pool| {
            let mut query = sqlx::query_as::<_, (i64, i64, String)>(&sql);
            for id in article_ids {
                query = query.bind(*id);
            }
            query.fetch_all(pool).await
        })
        .context("Failed to get tags for articles")?;

        Ok(rows
            .into_iter()
            .map(|(article_id, id, name)| (article_id, Tag { id, name }))
            .collect())
    }
}
