//! Database layer
//!
//! This module provides database abstraction for Research Locker.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for hosted deployments)
//!
//! The database driver is selected based on configuration.
//!
//! # Usage
//!
//! ```ignore
//! use research_locker::config::DatabaseConfig;
//! use research_locker::db::{create_pool, migrations};
//!
//! let config = DatabaseConfig::default();
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, LastInsertId, MysqlDatabase,
    SqliteDatabase,
};

/// Run the same sqlx expression against whichever backend the pool wraps.
///
/// The body is expanded once per driver, so it type-checks against
/// `&SqlitePool` and `&MySqlPool` independently. Queries must therefore stick
/// to SQL both backends accept.
///
/// ```ignore
/// let count: i64 = on_pool!(self.pool, |pool| {
///     sqlx::query_scalar("SELECT COUNT(*) FROM articles").fetch_one(pool).await
/// })
/// .context("Failed to count articles")?;
/// ```
#[macro_export]
macro_rules! on_pool {
    ($pool:expr, |$conn:ident| $body:expr) => {
        match $pool.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $conn = $pool.sqlite()?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $conn = $pool.mysql()?;
                $body
            }
        }
    };
}
