//! Cache layer
//!
//! In-process TTL cache used for upstream metadata lookups (Crossref works).
//! Values are stored as JSON so any serializable type can be cached.
//!
//! # Usage
//!
//! ```rust,ignore
//! use research_locker::cache::{CacheLayer, MemoryCache};
//!
//! let cache = MemoryCache::new();
//! cache.set("crossref:10.1000/xyz", &work, Duration::from_secs(600)).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

pub use memory::MemoryCache;

/// Cache layer trait
///
/// Generic methods keep this trait out of `dyn` use; services hold the
/// concrete cache behind an `Arc`.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}
