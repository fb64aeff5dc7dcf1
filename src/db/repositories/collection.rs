//! Collection repository
//!
//! Database operations for collections and their article assignments.
//!
//! This module provides:
//! - `CollectionRepository` trait defining the interface for collection data access
//! - `SqlxCollectionRepository` implementing the trait for SQLite and MySQL

use crate::db::{DynDatabasePool, LastInsertId};
use crate::models::Collection;
use crate::on_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use super::insert_ignore;

const COLLECTION_SELECT: &str = r#"
    SELECT c.id, c.user_id, c.collection_name, c.created_at, c.updated_at,
        (SELECT COUNT(*) FROM collection_articles ca WHERE ca.collection_id = c.id) AS article_count
    FROM collections c
"#;

/// Collection repository trait
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    /// A user's collections, newest first
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Collection>>;

    /// Get a collection if `user_id` owns it
    async fn get_for_user(&self, id: i64, user_id: i64) -> Result<Option<Collection>>;

    /// Whether the user already has a collection with this name
    async fn name_exists(&self, user_id: i64, name: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Create a collection
    async fn create(&self, user_id: i64, name: &str) -> Result<Collection>;

    /// Rename an owned collection
    async fn rename(&self, id: i64, user_id: i64, name: &str) -> Result<bool>;

    /// Delete an owned collection and its assignments
    async fn delete(&self, id: i64, user_id: i64) -> Result<bool>;

    /// Assign articles, skipping ones already present; returns how many were added
    async fn assign(&self, collection_id: i64, article_ids: &[i64]) -> Result<usize>;

    /// Remove one assignment
    async fn unassign(&self, collection_id: i64, article_id: i64) -> Result<bool>;
}

/// SQLx-based collection repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxCollectionRepository {
    pool: DynDatabasePool,
}

impl SqlxCollectionRepository {
    /// Create a new SQLx collection repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CollectionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CollectionRepository for SqlxCollectionRepository {
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Collection>> {
        let sql = format!(
            "{} WHERE c.user_id = ? ORDER BY c.created_at DESC, c.id DESC",
            COLLECTION_SELECT
        );
        let collections = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Collection>(&sql)
                .bind(user_id)
                .fetch_all(pool)
                .await
        })
        .context("Failed to list collections")?;
        Ok(collections)
    }

    async fn get_for_user(&self, id: i64, user_id: i64) -> Result<Option<Collection>> {
        let sql = format!("{} WHERE c.id = ? AND c.user_id = ?", COLLECTION_SELECT);
        let collection = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Collection>(&sql)
                .bind(id)
                .bind(user_id)
                .fetch_optional(pool)
                .await
        })
        .context("Failed to get collection")?;
        Ok(collection)
    }

    async fn name_exists(&self, user_id: i64, name: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count = on_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM collections WHERE user_id = ? AND collection_name = ? AND id <> ?",
            )
            .bind(user_id)
            .bind(name)
            .bind(exclude_id.unwrap_or(0))
            .fetch_one(pool)
            .await
        })
        .context("Failed to check collection name")?;
        Ok(count > 0)
    }

    async fn create(&self, user_id: i64, name: &str) -> Result<Collection> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO collections (user_id, collection_name, created_at, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(name)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .map(|result| result.last_id())
        })
        .context("Failed to create collection")?;

        self.get_for_user(id, user_id)
            .await?
            .context("Created collection could not be read back")
    }

    async fn rename(&self, id: i64, user_id: i64, name: &str) -> Result<bool> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE collections SET collection_name = ?, updated_at = ? WHERE id = ? AND user_id = ?",
            )
            .bind(name)
            .bind(Utc::now())
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await
            .map(|result| result.rows_affected())
        })
        .context("Failed to rename collection")?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64, user_id: i64) -> Result<bool> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                DELETE FROM collection_articles WHERE collection_id IN
                    (SELECT id FROM collections WHERE id = ? AND user_id = ?)
                "#,
            )
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
            sqlx::query("DELETE FROM collections WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|result| result.rows_affected())
        })
        .context("Failed to delete collection")?;
        Ok(affected > 0)
    }

    async fn assign(&self, collection_id: i64, article_ids: &[i64]) -> Result<usize> {
        let sql = format!(
            "{} INTO collection_articles (collection_id, article_id, created_at) VALUES (?, ?, ?)",
            insert_ignore(self.pool.driver())
        );
        let mut assigned = 0;
        for article_id in article_ids {
            let affected = on_pool!(self.pool, |pool| {
                sqlx::query(&sql)
                    .bind(collection_id)
                    .bind(*article_id)
                    .bind(Utc::now())
                    .execute(pool)
                    .await
                    .map(|result| result.rows_affected())
            })
            .context("Failed to assign article to collection")?;
            if affected > 0 {
                assigned += 1;
            }
        }
        Ok(assigned)
    }

    async fn unassign(&self, collection_id: i64, article_id: i64) -> Result<bool> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM collection_articles WHERE collection_id = ? AND article_id = ?")
                .bind(collection_id)
                .bind(article_id)
                .execute(pool)
                .await
                .map(|result| result.rows_affected())
        })
        .context("Failed to remove article from collection")?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_article, insert_user, setup_pool};

    #[tokio::test]
    async fn test_create_list_and_scope() {
        let pool = setup_pool().await;
        let alice = insert_user(&pool, "a@example.com").await;
        let bob = insert_user(&pool, "b@example.com").await;
        let repo = SqlxCollectionRepository::new(pool);

        let first = repo.create(alice, "Thesis").await.unwrap();
        let second = repo.create(alice, "Reading").await.unwrap();
        assert_eq!(first.article_count, 0);

        let ids: Vec<i64> = repo
            .list_by_user(alice)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);

        assert!(repo.get_for_user(first.id, bob).await.unwrap().is_none());
        assert!(repo.list_by_user(bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_name_exists_excludes_self() {
        let pool = setup_pool().await;
        let alice = insert_user(&pool, "a@example.com").await;
        let bob = insert_user(&pool, "b@example.com").await;
        let repo = SqlxCollectionRepository::new(pool);

        let thesis = repo.create(alice, "Thesis").await.unwrap();
        assert!(repo.name_exists(alice, "Thesis", None).await.unwrap());
        assert!(!repo.name_exists(alice, "Thesis", Some(thesis.id)).await.unwrap());
        assert!(!repo.name_exists(bob, "Thesis", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_assign_skips_duplicates_and_counts() {
        let pool = setup_pool().await;
        let alice = insert_user(&pool, "a@example.com").await;
        let a = insert_article(&pool, alice, "A").await;
        let b = insert_article(&pool, alice, "B").await;
        let repo = SqlxCollectionRepository::new(pool);
        let collection = repo.create(alice, "Thesis").await.unwrap();

        assert_eq!(repo.assign(collection.id, &[a]).await.unwrap(), 1);
        assert_eq!(repo.assign(collection.id, &[a, b]).await.unwrap(), 1);

        let reloaded = repo.get_for_user(collection.id, alice).await.unwrap().unwrap();
        assert_eq!(reloaded.article_count, 2);

        assert!(repo.unassign(collection.id, a).await.unwrap());
        assert!(!repo.unassign(collection.id, a).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_removes_assignments() {
        let pool = setup_pool().await;
        let alice = insert_user(&pool, "a@example.com").await;
        let bob = insert_user(&pool, "b@example.com").await;
        let a = insert_article(&pool, alice, "A").await;
        let repo = SqlxCollectionRepository::new(pool.clone());
        let collection = repo.create(alice, "Thesis").await.unwrap();
        repo.assign(collection.id, &[a]).await.unwrap();

        assert!(!repo.delete(collection.id, bob).await.unwrap());
        assert!(repo.delete(collection.id, alice).await.unwrap());

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collection_articles")
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_rename() {
        let pool = setup_pool().await;
        let alice = insert_user(&pool, "a@example.com").await;
        let repo = SqlxCollectionRepository::new(pool);
        let collection = repo.create(alice, "Old").await.unwrap();

        assert!(repo.rename(collection.id, alice, "New").await.unwrap());
        let renamed = repo.get_for_user(collection.id, alice).await.unwrap().unwrap();
        assert_eq!(renamed.collection_name, "New");
    }
}
