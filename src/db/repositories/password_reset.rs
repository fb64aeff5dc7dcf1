//! Password reset repository

use crate::db::DynDatabasePool;
use crate::models::PasswordReset;
use crate::on_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    /// Store a new token digest
    async fn create(&self, user_id: i64, token_hash: &str, expires_at: DateTime<Utc>) -> Result<()>;

    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<PasswordReset>>;

    /// Mark a token used; false if it was already used
    async fn mark_used(&self, id: i64) -> Result<bool>;

    /// Drop expired and used tokens
    async fn delete_stale(&self, now: DateTime<Utc>) -> Result<u64>;
}

pub struct SqlxPasswordResetRepository {
    pool: DynDatabasePool,
}

impl SqlxPasswordResetRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PasswordResetRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PasswordResetRepository for SqlxPasswordResetRepository {
    async fn create(&self, user_id: i64, token_hash: &str, expires_at: DateTime<Utc>) -> Result<()> {
        on_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO password_resets (user_id, token_hash, expires_at, used, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(token_hash)
            .bind(expires_at)
            .bind(false)
            .bind(Utc::now())
            .execute(pool)
            .await
            .map(|_| ())
        })
        .context("Failed to store password reset")?;
        Ok(())
    }

    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<PasswordReset>> {
        let reset = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, PasswordReset>(
                "SELECT id, user_id, token_hash, expires_at, used FROM password_resets WHERE token_hash = ?",
            )
            .bind(token_hash)
            .fetch_optional(pool)
            .await
        })
        .context("Failed to get password reset")?;
        Ok(reset)
    }

    async fn mark_used(&self, id: i64) -> Result<bool> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query("UPDATE password_resets SET used = ? WHERE id = ? AND used = ?")
                .bind(true)
                .bind(id)
                .bind(false)
                .execute(pool)
                .await
                .map(|result| result.rows_affected())
        })
        .context("Failed to mark password reset used")?;
        Ok(affected > 0)
    }

    async fn delete_stale(&self, now: DateTime<Utc>) -> Result<u64> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM password_resets WHERE used = ? OR expires_at < ?")
                .bind(true)
                .bind(now)
                .execute(pool)
                .await
                .map(|result| result.rows_affected())
        })
        .context("Failed to delete stale password resets")?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use chrono::Duration;

    #[tokio::test]
    async fn test_single_use_token() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "r@example.com").await;
        let repo = SqlxPasswordResetRepository::new(pool);

        repo.create(user, "abc123", Utc::now() + Duration::minutes(30))
            .await
            .unwrap();

        let reset = repo.get_by_hash("abc123").await.unwrap().unwrap();
        assert_eq!(reset.user_id, user);
        assert!(reset.is_usable(Utc::now()));

        assert!(repo.mark_used(reset.id).await.unwrap());
        assert!(!repo.mark_used(reset.id).await.unwrap());
        assert!(repo.get_by_hash("abc123").await.unwrap().unwrap().used);
        assert!(repo.get_by_hash("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_stale() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "r@example.com").await;
        let repo = SqlxPasswordResetRepository::new(pool);
        let now = Utc::now();

        repo.create(user, "expired", now - Duration::minutes(1)).await.unwrap();
        repo.create(user, "fresh", now + Duration::minutes(30)).await.unwrap();

        assert_eq!(repo.delete_stale(now).await.unwrap(), 1);
        assert!(repo.get_by_hash("fresh").await.unwrap().is_some());
    }
}
