//! Article repository
//!
//! Database operations for articles. Every read and write is scoped by the
//! owning user id, so one user can never observe another user's library.
//!
//! This module provides:
//! - `ArticleRepository` trait defining the interface for article data access
//! - `SqlxArticleRepository` implementing the trait for SQLite and MySQL

use crate::db::{DynDatabasePool, LastInsertId};
use crate::models::{Article, ArticleInput};
use crate::on_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use super::{like_pattern, placeholders};

/// Article columns, qualified with the `a` alias used by every query here
pub(crate) const ARTICLE_COLUMNS: &str = "a.id, a.user_id, a.title, a.authors, a.journal, a.doi, \
     a.url, a.abstract, a.purchase_date, a.price, a.file_name, a.summary, a.hashtags, \
     a.created_at, a.updated_at";

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Create a new article for `user_id`
    async fn create(&self, user_id: i64, input: &ArticleInput) -> Result<Article>;

    /// Get an article by ID if `user_id` owns it
    async fn get_for_user(&self, id: i64, user_id: i64) -> Result<Option<Article>>;

    /// All of a user's articles, newest id first
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Article>>;

    /// Number of articles a user owns
    async fn count_by_user(&self, user_id: i64) -> Result<i64>;

    /// Replace the editable fields; false when the row is not owned
    async fn update_for_user(&self, id: i64, user_id: i64, input: &ArticleInput) -> Result<bool>;

    /// Delete an owned article; false when the row is not owned
    async fn delete_for_user(&self, id: i64, user_id: i64) -> Result<bool>;

    /// Attach a stored PDF
    async fn set_file_name(&self, id: i64, user_id: i64, file_name: &str) -> Result<bool>;

    /// A user's articles carrying the tag
    async fn list_by_tag(&self, tag_id: i64, user_id: i64) -> Result<Vec<Article>>;

    /// Raw `authors` strings of a user's articles
    async fn list_author_strings(&self, user_id: i64) -> Result<Vec<String>>;

    /// A user's articles whose authors text contains `name`
    async fn list_by_author(&self, user_id: i64, name: &str) -> Result<Vec<Article>>;

    /// The subset of `ids` owned by `user_id`
    async fn owned_ids(&self, user_id: i64, ids: &[i64]) -> Result<Vec<i64>>;

    /// Articles assigned to a collection, newest assignment first
    async fn list_in_collection(&self, collection_id: i64) -> Result<Vec<Article>>;

    /// A user's articles not yet in the collection
    async fn list_not_in_collection(&self, user_id: i64, collection_id: i64) -> Result<Vec<Article>>;

    /// A user's articles linked to the publisher
    async fn list_by_publisher(&self, publisher_id: i64, user_id: i64) -> Result<Vec<Article>>;
}

/// SQLx-based article repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    /// Create a new SQLx article repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_articles(&self, sql: &str, binds: &[i64], context: &'static str) -> Result<Vec<Article>> {
        let articles = on_pool!(self.pool, |pool| {
            let mut query = sqlx::query_as::<_, Article>(sql);
            for value in binds {
                query = query.bind(*value);
            }
            query.fetch_all(pool).await
        })
        .context(context)?;
        Ok(articles)
    }
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, user_id: i64, input: &ArticleInput) -> Result<Article> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                INSERT INTO articles (user_id, title, authors, journal, doi, url, abstract,
                    purchase_date, price, file_name, summary, hashtags, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(&input.title)
            .bind(&input.authors)
            .bind(&input.journal)
            .bind(&input.doi)
            .bind(&input.url)
            .bind(&input.abstract_text)
            .bind(input.purchase_date)
            .bind(input.price)
            .bind(&input.file_name)
            .bind(&input.summary)
            .bind(&input.hashtags)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .map(|result| result.last_id())
        })
        .context("Failed to create article")?;

        self.get_for_user(id, user_id)
            .await?
            .context("Created article could not be read back")
    }

    async fn get_for_user(&self, id: i64, user_id: i64) -> Result<Option<Article>> {
        let sql = format!(
            "SELECT {} FROM articles a WHERE a.id = ? AND a.user_id = ?",
            ARTICLE_COLUMNS
        );
        let article = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Article>(&sql)
                .bind(id)
                .bind(user_id)
                .fetch_optional(pool)
                .await
        })
        .context("Failed to get article by ID")?;
        Ok(article)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM articles a WHERE a.user_id = ? ORDER BY a.id DESC",
            ARTICLE_COLUMNS
        );
        self.fetch_articles(&sql, &[user_id], "Failed to list articles")
            .await
    }

    async fn count_by_user(&self, user_id: i64) -> Result<i64> {
        let count = on_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(pool)
                .await
        })
        .context("Failed to count articles")?;
        Ok(count)
    }

    async fn update_for_user(&self, id: i64, user_id: i64, input: &ArticleInput) -> Result<bool> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                UPDATE articles
                SET title = ?, authors = NULLIF(COALESCE(?, authors), ''),
                    journal = NULLIF(COALESCE(?, journal), ''), doi = NULLIF(COALESCE(?, doi), ''),
                    url = ?, abstract = NULLIF(COALESCE(?, abstract), ''),
                    purchase_date = COALESCE(?, purchase_date), price = COALESCE(?, price),
                    file_name = COALESCE(?, file_name),
                    summary = COALESCE(?, summary), hashtags = COALESCE(?, hashtags), updated_at = ?
                WHERE id = ? AND user_id = ?
                "#,
            )
            .bind(&input.title)
            .bind(&input.authors)
            .bind(&input.journal)
            .bind(&input.doi)
            .bind(&input.url)
            .bind(&input.abstract_text)
            .bind(input.purchase_date)
            .bind(input.price)
            .bind(&input.file_name)
            .bind(&input.summary)
            .bind(&input.hashtags)
            .bind(Utc::now())
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await
            .map(|result| result.rows_affected())
        })
        .context("Failed to update article")?;
        Ok(affected > 0)
    }

    async fn delete_for_user(&self, id: i64, user_id: i64) -> Result<bool> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM articles WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|result| result.rows_affected())
        })
        .context("Failed to delete article")?;
        Ok(affected > 0)
    }

    async fn set_file_name(&self, id: i64, user_id: i64, file_name: &str) -> Result<bool> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query("UPDATE articles SET file_name = ?, updated_at = ? WHERE id = ? AND user_id = ?")
                .bind(file_name)
                .bind(Utc::now())
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|result| result.rows_affected())
        })
        .context("Failed to attach file to article")?;
        Ok(affected > 0)
    }

    async fn list_by_tag(&self, tag_id: i64, user_id: i64) -> Result<Vec<Article>> {
        let sql = format!(
            r#"
            SELECT {} FROM articles a
            INNER JOIN article_tags atg ON atg.article_id = a.id
            WHERE atg.tag_id = ? AND a.user_id = ?
            ORDER BY a.id DESC
            "#,
            ARTICLE_COLUMNS
        );
        self.fetch_articles(&sql, &[tag_id, user_id], "Failed to list articles by tag")
            .await
    }

    async fn list_author_strings(&self, user_id: i64) -> Result<Vec<String>> {
        let authors = on_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, String>(
                "SELECT authors FROM articles WHERE user_id = ? AND authors IS NOT NULL AND authors <> ''",
            )
            .bind(user_id)
            .fetch_all(pool)
            .await
        })
        .context("Failed to list article authors")?;
        Ok(authors)
    }

    async fn list_by_author(&self, user_id: i64, name: &str) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM articles a WHERE a.user_id = ? AND a.authors LIKE ? ESCAPE '!' ORDER BY a.id DESC",
            ARTICLE_COLUMNS
        );
        let pattern = like_pattern(name);
        let articles = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Article>(&sql)
                .bind(user_id)
                .bind(&pattern)
                .fetch_all(pool)
                .await
        })
        .context("Failed to list articles by author")?;
        Ok(articles)
    }

    async fn owned_ids(&self, user_id: i64, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id FROM articles WHERE user_id = ? AND id IN ({})",
            placeholders(ids.len())
        );
        let owned = on_pool!(self.pool, |pool| {
            let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(user_id);
            for id in ids {
                query = query.bind(*id);
            }
            query.fetch_all(pool).await
        })
        .context("Failed to check article ownership")?;
        Ok(owned)
    }

    async fn list_in_collection(&self, collection_id: i64) -> Result<Vec<Article>> {
        let sql = format!(
            r#"
            SELECT {} FROM articles a
            INNER JOIN collection_articles ca ON ca.article_id = a.id
            WHERE ca.collection_id = ?
            ORDER BY ca.id DESC
            "#,
            ARTICLE_COLUMNS
        );
        self.fetch_articles(&sql, &[collection_id], "Failed to list collection articles")
            .await
    }

    async fn list_not_in_collection(&self, user_id: i64, collection_id: i64) -> Result<Vec<Article>> {
        let sql = format!(
            r#"
            SELECT {} FROM articles a
            WHERE a.user_id = ?
              AND a.id NOT IN (SELECT article_id FROM collection_articles WHERE collection_id = ?)
            ORDER BY a.id DESC
            "#,
            ARTICLE_COLUMNS
        );
        self.fetch_articles(
            &sql,
            &[user_id, collection_id],
            "Failed to list available articles",
        )
        .await
    }

    async fn list_by_publisher(&self, publisher_id: i64, user_id: i64) -> Result<Vec<Article>> {
        let sql = format!(
            r#"
            SELECT {} FROM articles a
            INNER JOIN article_publishers ap ON ap.article_id = a.id
            WHERE ap.publisher_id = ? AND a.user_id = ?
            ORDER BY a.id DESC
            "#,
            ARTICLE_COLUMNS
        );
        self.fetch_articles(
            &sql,
            &[publisher_id, user_id],
            "Failed to list articles by publisher",
        )
        .await
    }
}
