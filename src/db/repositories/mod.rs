//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one aggregate.

pub mod article;
pub mod billing;
pub mod collection;
pub mod doi_reference;
pub mod home_button;
pub mod password_reset;
pub mod publisher;
pub mod tag;
pub mod user;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use billing::{BillingRepository, SqlxBillingRepository};
pub use collection::{CollectionRepository, SqlxCollectionRepository};
pub use doi_reference::{DoiReferenceRepository, SqlxDoiReferenceRepository};
pub use home_button::{HomeButtonRepository, SqlxHomeButtonRepository};
pub use password_reset::{PasswordResetRepository, SqlxPasswordResetRepository};
pub use publisher::{PublisherRepository, SqlxPublisherRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};

use crate::config::DatabaseDriver;

/// `?, ?, ?` for an IN clause of `count` values
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// `%needle%` with LIKE wildcards escaped; pair with `ESCAPE '!'`
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Insert that silently skips rows violating a unique key
pub(crate) fn insert_ignore(driver: DatabaseDriver) -> &'static str {
    match driver {
        DatabaseDriver::Sqlite => "INSERT OR IGNORE",
        DatabaseDriver::Mysql => "INSERT IGNORE",
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::db::{create_test_pool, migrations::run_migrations, DynDatabasePool};
    use chrono::Utc;

    /// Migrated in-memory database
    pub async fn setup_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    pub async fn insert_user(pool: &DynDatabasePool, email: &str) -> i64 {
        sqlx::query("INSERT INTO users (name, email, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind("Tester")
            .bind(email)
            .bind(Utc::now())
            .bind(Utc::now())
            .execute(pool.sqlite().expect("sqlite pool"))
            .await
            .expect("Failed to insert user")
            .last_insert_rowid()
    }

    pub async fn insert_article(pool: &DynDatabasePool, user_id: i64, title: &str) -> i64 {
        sqlx::query(
            "INSERT INTO articles (user_id, title, url, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(title)
        .bind("https://example.com/paper")
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(pool.sqlite().expect("sqlite pool"))
        .await
        .expect("Failed to insert article")
        .last_insert_rowid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Doe"), "%Doe%");
        assert_eq!(like_pattern("50%_a!"), "%50!%!_a!!%");
    }
}
