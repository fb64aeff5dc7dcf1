//! Publisher repository
//!
//! Publishers are shared between users; their article links and counts are
//! always filtered down to the calling user's articles.

use crate::db::{DynDatabasePool, LastInsertId};
use crate::models::Publisher;
use crate::on_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use super::{insert_ignore, like_pattern};

/// Publisher repository trait
#[async_trait]
pub trait PublisherRepository: Send + Sync {
    /// All publishers by name, counting only `user_id`'s linked articles
    async fn list_with_counts(&self, user_id: i64) -> Result<Vec<Publisher>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Publisher>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Publisher>>;

    /// Returns the publisher and whether it was created by this call
    async fn find_or_create(&self, name: &str) -> Result<(Publisher, bool)>;

    async fn rename(&self, id: i64, name: &str) -> Result<bool>;

    /// Delete a publisher and its article links
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Link an article; true when a new link was created
    async fn link_article(&self, article_id: i64, publisher_id: i64) -> Result<bool>;

    async fn unlink_article(&self, article_id: i64, publisher_id: i64) -> Result<bool>;

    /// Publishers whose name contains `query`, by name
    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Publisher>>;
}

/// SQLx-based publisher repository implementation
pub struct SqlxPublisherRepository {
    pool: DynDatabasePool,
}

impl SqlxPublisherRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PublisherRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PublisherRepository for SqlxPublisherRepository {
    async fn list_with_counts(&self, user_id: i64) -> Result<Vec<Publisher>> {
        let publishers = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Publisher>(
                r#"
                SELECT p.id, p.name, p.created_at, p.updated_at,
                    (SELECT COUNT(*) FROM article_publishers ap
                        INNER JOIN articles a ON a.id = ap.article_id
                        WHERE ap.publisher_id = p.id AND a.user_id = ?) AS article_count
                FROM publishers p
                ORDER BY p.name ASC
                "#,
            )
            .bind(user_id)
            .fetch_all(pool)
            .await
        })
        .context("Failed to list publishers")?;
        Ok(publishers)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Publisher>> {
        let publisher = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Publisher>(
                "SELECT id, name, created_at, updated_at FROM publishers WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
        })
        .context("Failed to get publisher by ID")?;
        Ok(publisher)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Publisher>> {
        let publisher = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Publisher>(
                "SELECT id, name, created_at, updated_at FROM publishers WHERE name = ?",
            )
            .bind(name)
            .fetch_optional(pool)
            .await
        })
        .context("Failed to get publisher by name")?;
        Ok(publisher)
    }

    async fn find_or_create(&self, name: &str) -> Result<(Publisher, bool)> {
        if let Some(existing) = self.get_by_name(name).await? {
            return Ok((existing, false));
        }

        let now = Utc::now();
        let sql = format!(
            "{} INTO publishers (name, created_at, updated_at) VALUES (?, ?, ?)",
            insert_ignore(self.pool.driver())
        );
        let (affected, id) = on_pool!(self.pool, |pool| {
            sqlx::query(&sql)
                .bind(name)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .map(|result| (result.rows_affected(), result.last_id()))
        })
        .context("Failed to create publisher")?;

        // A concurrent request may have inserted the same name first.
        let publisher = if affected > 0 {
            self.get_by_id(id).await?
        } else {
            self.get_by_name(name).await?
        };
        let publisher = publisher.with_context(|| format!("Publisher '{}' missing after insert", name))?;
        Ok((publisher, affected > 0))
    }

    async fn rename(&self, id: i64, name: &str) -> Result<bool> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query("UPDATE publishers SET name = ?, updated_at = ? WHERE id = ?")
                .bind(name)
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await
                .map(|result| result.rows_affected())
        })
        .context("Failed to rename publisher")?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM article_publishers WHERE publisher_id = ?")
                .bind(id)
                .execute(pool)
                .await?;
            sqlx::query("DELETE FROM publishers WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .map(|result| result.rows_affected())
        })
        .context("Failed to delete publisher")?;
        Ok(affected > 0)
    }

    async fn link_article(&self, article_id: i64, publisher_id: i64) -> Result<bool> {
        let sql = format!(
            "{} INTO article_publishers (article_id, publisher_id, created_at) VALUES (?, ?, ?)",
            insert_ignore(self.pool.driver())
        );
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query(&sql)
                .bind(article_id)
                .bind(publisher_id)
                .bind(Utc::now())
                .execute(pool)
                .await
                .map(|result| result.rows_affected())
        })
        .context("Failed to link publisher to article")?;
        Ok(affected > 0)
    }

    async fn unlink_article(&self, article_id: i64, publisher_id: i64) -> Result<bool> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM article_publishers WHERE article_id = ? AND publisher_id = ?")
                .bind(article_id)
                .bind(publisher_id)
                .execute(pool)
                .await
                .map(|result| result.rows_affected())
        })
        .context("Failed to unlink publisher from article")?;
        Ok(affected > 0)
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Publisher>> {
        let pattern = like_pattern(query);
        let publishers = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Publisher>(
                r#"
                SELECT id, name, created_at, updated_at FROM publishers
                WHERE name LIKE ? ESCAPE '!'
                ORDER BY name ASC
                LIMIT ?
                "#,
            )
            .bind(&pattern)
            .bind(limit)
            .fetch_all(pool)
            .await
        })
        .context("Failed to search publishers")?;
        Ok(publishers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_article, insert_user, setup_pool};

    #[tokio::test]
    async fn test_find_or_create_reports_creation() {
        let pool = setup_pool().await;
        let repo = SqlxPublisherRepository::new(pool);

        let (created, was_created) = repo.find_or_create("Elsevier").await.unwrap();
        assert!(was_created);
        let (found, was_created) = repo.find_or_create("Elsevier").await.unwrap();
        assert!(!was_created);
        assert_eq!(created.id, found.id);
    }

    #[tokio::test]
    async fn test_counts_only_include_callers_articles() {
        let pool = setup_pool().await;
        let alice = insert_user(&pool, "a@example.com").await;
        let bob = insert_user(&pool, "b@example.com").await;
        let a1 = insert_article(&pool, alice, "A1").await;
        let a2 = insert_article(&pool, alice, "A2").await;
        let b1 = insert_article(&pool, bob, "B1").await;
        let repo = SqlxPublisherRepository::new(pool);

        let (springer, _) = repo.find_or_create("Springer").await.unwrap();
        assert!(repo.link_article(a1, springer.id).await.unwrap());
        assert!(!repo.link_article(a1, springer.id).await.unwrap());
        repo.link_article(a2, springer.id).await.unwrap();
        repo.link_article(b1, springer.id).await.unwrap();

        let for_alice = repo.list_with_counts(alice).await.unwrap();
        assert_eq!(for_alice[0].article_count, 2);
        let for_bob = repo.list_with_counts(bob).await.unwrap();
        assert_eq!(for_bob[0].article_count, 1);

        assert!(repo.unlink_article(a1, springer.id).await.unwrap());
        assert!(!repo.unlink_article(a1, springer.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_search_and_limit() {
        let pool = setup_pool().await;
        let repo = SqlxPublisherRepository::new(pool);
        for name in ["Nature Publishing", "Oxford Press", "Cambridge Press", "MIT Press"] {
            repo.find_or_create(name).await.unwrap();
        }

        let names: Vec<String> = repo
            .search("Press", 20)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Cambridge Press", "MIT Press", "Oxford Press"]);
        assert_eq!(repo.search("Press", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let pool = setup_pool().await;
        let alice = insert_user(&pool, "a@example.com").await;
        let article = insert_article(&pool, alice, "A").await;
        let repo = SqlxPublisherRepository::new(pool);

        let (publisher, _) = repo.find_or_create("IEEE").await.unwrap();
        repo.link_article(article, publisher.id).await.unwrap();

        assert!(repo.rename(publisher.id, "IEEE Xplore").await.unwrap());
        assert_eq!(
            repo.get_by_id(publisher.id).await.unwrap().unwrap().name,
            "IEEE Xplore"
        );

        assert!(repo.delete(publisher.id).await.unwrap());
        assert!(repo.get_by_id(publisher.id).await.unwrap().is_none());
        assert!(!repo.delete(publisher.id).await.unwrap());
    }
}
