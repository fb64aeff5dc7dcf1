//! Home button repository

use crate::db::{DynDatabasePool, LastInsertId};
use crate::models::HomeButton;
use crate::on_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait HomeButtonRepository: Send + Sync {
    /// Buttons by id, optionally only one position
    async fn list(&self, position: Option<&str>) -> Result<Vec<HomeButton>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<HomeButton>>;

    async fn create(&self, name: &str, position: &str) -> Result<HomeButton>;

    async fn update(&self, id: i64, name: &str, position: &str) -> Result<bool>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxHomeButtonRepository {
    pool: DynDatabasePool,
}

impl SqlxHomeButtonRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn HomeButtonRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl HomeButtonRepository for SqlxHomeButtonRepository {
    async fn list(&self, position: Option<&str>) -> Result<Vec<HomeButton>> {
        let buttons = on_pool!(self.pool, |pool| {
            match position {
                Some(position) => {
                    sqlx::query_as::<_, HomeButton>(
                        "SELECT id, name, position, created_at, updated_at FROM home_buttons WHERE position = ? ORDER BY id ASC",
                    )
                    .bind(position)
                    .fetch_all(pool)
                    .await
                }
                None => {
                    sqlx::query_as::<_, HomeButton>(
                        "SELECT id, name, position, created_at, updated_at FROM home_buttons ORDER BY id ASC",
                    )
                    .fetch_all(pool)
                    .await
                }
            }
        })
        .context("Failed to list home buttons")?;
        Ok(buttons)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<HomeButton>> {
        let button = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, HomeButton>(
                "SELECT id, name, position, created_at, updated_at FROM home_buttons WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
        })
        .context("Failed to get home button")?;
        Ok(button)
    }

    async fn create(&self, name: &str, position: &str) -> Result<HomeButton> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO home_buttons (name, position, created_at, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(name)
            .bind(position)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .map(|result| result.last_id())
        })
        .context("Failed to create home button")?;

        self.get_by_id(id)
            .await?
            .context("Created home button could not be read back")
    }

    async fn update(&self, id: i64, name: &str, position: &str) -> Result<bool> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query("UPDATE home_buttons SET name = ?, position = ?, updated_at = ? WHERE id = ?")
                .bind(name)
                .bind(position)
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await
                .map(|result| result.rows_affected())
        })
        .context("Failed to update home button")?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM home_buttons WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .map(|result| result.rows_affected())
        })
        .context("Failed to delete home button")?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;

    #[tokio::test]
    async fn test_crud_and_filter() {
        let pool = setup_pool().await;
        let repo = SqlxHomeButtonRepository::new(pool);

        let about = repo.create("About", "header").await.unwrap();
        repo.create("Privacy", "footer").await.unwrap();

        assert_eq!(repo.list(None).await.unwrap().len(), 2);
        let footer = repo.list(Some("footer")).await.unwrap();
        assert_eq!(footer.len(), 1);
        assert_eq!(footer[0].name, "Privacy");

        assert!(repo.update(about.id, "About us", "footer").await.unwrap());
        assert_eq!(repo.list(Some("footer")).await.unwrap().len(), 2);

        assert!(repo.delete(about.id).await.unwrap());
        assert!(!repo.delete(about.id).await.unwrap());
        assert!(repo.get_by_id(about.id).await.unwrap().is_none());
    }
}
