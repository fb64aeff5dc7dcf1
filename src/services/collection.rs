//! Collection service
//!
//! Collections are user-named groups of the user's own articles. Names are
//! unique per user, and only owned articles can be assigned.

use crate::db::repositories::{ArticleRepository, CollectionRepository};
use crate::models::{Article, AssignOutcome, Collection, CollectionWithArticles};
use crate::services::validation::FieldError;
use std::sync::Arc;

const MAX_NAME_LENGTH: usize = 255;

/// Error types for collection service operations
#[derive(Debug, thiserror::Error)]
pub enum CollectionServiceError {
    #[error("Collection not found")]
    NotFound,

    #[error("Validation failed")]
    ValidationError(Vec<FieldError>),

    #[error("A collection with this name already exists")]
    DuplicateName,

    #[error("Some articles not found or do not belong to you")]
    ArticlesNotOwned,

    #[error("Article not found in this collection")]
    NotAssigned,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CollectionService {
    repo: Arc<dyn CollectionRepository>,
    article_repo: Arc<dyn ArticleRepository>,
}

impl CollectionService {
    pub fn new(repo: Arc<dyn CollectionRepository>, article_repo: Arc<dyn ArticleRepository>) -> Self {
        Self { repo, article_repo }
    }

    /// The owner's collections, newest first
    pub async fn list(&self, user_id: i64) -> Result<Vec<Collection>, CollectionServiceError> {
        Ok(self.repo.list_by_user(user_id).await?)
    }

    pub async fn create(&self, user_id: i64, name: Option<&str>) -> Result<Collection, CollectionServiceError> {
        let name = validate_name(name)?;
        if self.repo.name_exists(user_id, &name, None).await? {
            return Err(CollectionServiceError::DuplicateName);
        }
        let collection = self.repo.create(user_id, &name).await?;
        tracing::debug!(collection_id = collection.id, user_id, "Collection created");
        Ok(collection)
    }

    /// A collection with its articles, most recently assigned first
    pub async fn get(&self, id: i64, user_id: i64) -> Result<CollectionWithArticles, CollectionServiceError> {
        let collection = self.require(id, user_id).await?;
        let articles = self.article_repo.list_in_collection(collection.id).await?;
        Ok(CollectionWithArticles { collection, articles })
    }

    pub async fn rename(
        &self,
        id: i64,
        user_id: i64,
        name: Option<&str>,
    ) -> Result<Collection, CollectionServiceError> {
        let name = validate_name(name)?;
        self.require(id, user_id).await?;
        if self.repo.name_exists(user_id, &name, Some(id)).await? {
            return Err(CollectionServiceError::DuplicateName);
        }
        self.repo.rename(id, user_id, &name).await?;
        self.require(id, user_id).await
    }

    /// Delete a collection and its assignments; articles are kept
    pub async fn delete(&self, id: i64, user_id: i64) -> Result<(), CollectionServiceError> {
        if !self.repo.delete(id, user_id).await? {
            return Err(CollectionServiceError::NotFound);
        }
        Ok(())
    }

    /// Assign owned articles, skipping ones already in the collection
    pub async fn assign(
        &self,
        id: i64,
        user_id: i64,
        article_ids: &[i64],
    ) -> Result<AssignOutcome, CollectionServiceError> {
        if article_ids.is_empty() {
            return Err(CollectionServiceError::ValidationError(vec![FieldError::new(
                "articleIds",
                "articleIds must be a non-empty array",
            )]));
        }
        self.require(id, user_id).await?;

        let mut requested = article_ids.to_vec();
        requested.sort_unstable();
        requested.dedup();

        let owned = self.article_repo.owned_ids(user_id, &requested).await?;
        if owned.len() != requested.len() {
            return Err(CollectionServiceError::ArticlesNotOwned);
        }

        let assigned_count = self.repo.assign(id, &requested).await?;
        Ok(AssignOutcome {
            assigned_count,
            total_requested: article_ids.len(),
        })
    }

    pub async fn unassign(&self, id: i64, user_id: i64, article_id: i64) -> Result<(), CollectionServiceError> {
        self.require(id, user_id).await?;
        if !self.repo.unassign(id, article_id).await? {
            return Err(CollectionServiceError::NotAssigned);
        }
        Ok(())
    }

    /// Owned articles not yet in the collection, newest first
    pub async fn available_articles(&self, id: i64, user_id: i64) -> Result<Vec<Article>, CollectionServiceError> {
        self.require(id, user_id).await?;
        Ok(self.article_repo.list_not_in_collection(user_id, id).await?)
    }

    async fn require(&self, id: i64, user_id: i64) -> Result<Collection, CollectionServiceError> {
        self.repo
            .get_for_user(id, user_id)
            .await?
            .ok_or(CollectionServiceError::NotFound)
    }
}

fn validate_name(name: Option<&str>) -> Result<String, CollectionServiceError> {
    let name = name.map(str::trim).unwrap_or_default();
    let message = if name.is_empty() {
        "Collection name is required"
    } else if name.chars().count() > MAX_NAME_LENGTH {
        "Collection name must be at most 255 characters"
    } else {
        return Ok(name.to_string());
    };
    Err(CollectionServiceError::ValidationError(vec![FieldError::new("name", message)]))
}
