//! DOI reference repository
//!
//! Stores one reference list per DOI. Rows are write-once: inserting a DOI
//! that already exists leaves the stored list untouched.

use crate::db::{DynDatabasePool, LastInsertId};
use crate::models::{DoiReference, ListParams};
use crate::on_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use super::insert_ignore;

/// DOI reference repository trait
#[async_trait]
pub trait DoiReferenceRepository: Send + Sync {
    async fn get_by_doi(&self, doi: &str) -> Result<Option<DoiReference>>;

    /// Insert unless the DOI exists; returns the new id, or `None` when it existed
    async fn insert_if_absent(&self, doi: &str, references_json: Option<&str>) -> Result<Option<i64>>;

    /// One page, newest first
    async fn list(&self, params: &ListParams) -> Result<Vec<DoiReference>>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based DOI reference repository implementation
pub struct SqlxDoiReferenceRepository {
    pool: DynDatabasePool,
}

impl SqlxDoiReferenceRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DoiReferenceRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl DoiReferenceRepository for SqlxDoiReferenceRepository {
    async fn get_by_doi(&self, doi: &str) -> Result<Option<DoiReference>> {
        let record = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, DoiReference>(
                "SELECT id, doi, references_json, created_at FROM doi_references WHERE doi = ?",
            )
            .bind(doi)
            .fetch_optional(pool)
            .await
        })
        .context("Failed to get DOI references")?;
        Ok(record)
    }

    async fn insert_if_absent(&self, doi: &str, references_json: Option<&str>) -> Result<Option<i64>> {
        let sql = format!(
            "{} INTO doi_references (doi, references_json, created_at) VALUES (?, ?, ?)",
            insert_ignore(self.pool.driver())
        );
        let (affected, id) = on_pool!(self.pool, |pool| {
            sqlx::query(&sql)
                .bind(doi)
                .bind(references_json)
                .bind(Utc::now())
                .execute(pool)
                .await
                .map(|result| (result.rows_affected(), result.last_id()))
        })
        .context("Failed to store DOI references")?;

        Ok((affected > 0).then_some(id))
    }

    async fn list(&self, params: &ListParams) -> Result<Vec<DoiReference>> {
        let records = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, DoiReference>(
                r#"
                SELECT id, doi, references_json, created_at FROM doi_references
                ORDER BY created_at DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
        })
        .context("Failed to list DOI references")?;
        Ok(records)
    }

    async fn count(&self) -> Result<i64> {
        let count = on_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM doi_references")
                .fetch_one(pool)
                .await
        })
        .context("Failed to count DOI references")?;
        Ok(count)
    }
}
