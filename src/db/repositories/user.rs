//! User repository
//!
//! Database operations for accounts and profiles.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{DynDatabasePool, LastInsertId};
use crate::models::{CreateUserInput, UpdateProfileInput, User, UserPlanKind};
use crate::on_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const USER_COLUMNS: &str = "id, name, email, password_hash, password_set, plan, phone_number, \
     profile_image, gender, university, department, program, year_of_study, research_area, \
     research_interests, publications, linkedin_url, google_scholar_url, orcid_id, bio, skills, \
     created_at, updated_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user with a password, returning the stored row
    async fn create(&self, input: &CreateUserInput) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email (exact match on the normalized address)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Write the supplied profile fields, returning the updated user
    async fn update_profile(&self, id: i64, input: &UpdateProfileInput) -> Result<Option<User>>;

    /// Replace the password hash and mark the password as set
    async fn set_password(&self, id: i64, password_hash: &str) -> Result<bool>;

    /// Change the plan column
    async fn set_plan(&self, id: i64, plan: UserPlanKind) -> Result<bool>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, input: &CreateUserInput) -> Result<User> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                INSERT INTO users (name, email, password_hash, password_set, plan, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(true)
            .bind(UserPlanKind::Free.as_str())
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .map(|result| result.last_id())
        })
        .context("Failed to create user")?;

        self.get_by_id(id)
            .await?
            .context("Created user could not be read back")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let user = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, User>(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
        })
        .context("Failed to get user by ID")?;
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let user = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, User>(&sql)
                .bind(email)
                .fetch_optional(pool)
                .await
        })
        .context("Failed to get user by email")?;
        Ok(user)
    }

    async fn update_profile(&self, id: i64, input: &UpdateProfileInput) -> Result<Option<User>> {
        let assignments = input.assignments();
        if assignments.is_empty() {
            return self.get_by_id(id).await;
        }

        // Column names come from a fixed whitelist, values are bound.
        let set_clause = assignments
            .iter()
            .map(|(column, _)| format!("{} = ?", column))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE users SET {}, updated_at = ? WHERE id = ?", set_clause);

        let affected = on_pool!(self.pool, |pool| {
            let mut query = sqlx::query(&sql);
            for (_, value) in &assignments {
                query = query.bind(*value);
            }
            query
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await
                .map(|result| result.rows_affected())
        })
        .context("Failed to update profile")?;

        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE users SET password_hash = ?, password_set = ?, updated_at = ? WHERE id = ?",
            )
            .bind(password_hash)
            .bind(true)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await
            .map(|result| result.rows_affected())
        })
        .context("Failed to set password")?;
        Ok(affected > 0)
    }

    async fn set_plan(&self, id: i64, plan: UserPlanKind) -> Result<bool> {
        let affected = on_pool!(self.pool, |pool| {
            sqlx::query("UPDATE users SET plan = ?, updated_at = ? WHERE id = ?")
                .bind(plan.as_str())
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await
                .map(|result| result.rows_affected())
        })
        .context("Failed to update user plan")?;
        Ok(affected > 0)
    }
}
