//! Publisher service
//!
//! Publishers are shared between users; article counts and article lists
//! only ever include the caller's articles.

use crate::db::repositories::{ArticleRepository, PublisherRepository};
use crate::models::{Publisher, PublisherWithArticles};
use crate::services::validation::FieldError;
use std::sync::Arc;

/// Maximum number of search results
pub const SEARCH_LIMIT: i64 = 20;

#[derive(Debug, thiserror::Error)]
pub enum PublisherServiceError {
    #[error("Publisher not found")]
    NotFound,

    #[error("Article not found")]
    ArticleNotFound,

    #[error("Association not found")]
    AssociationNotFound,

    #[error("Validation failed")]
    ValidationError(Vec<FieldError>),

    #[error("A publisher with this name already exists")]
    DuplicateName,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PublisherService {
    repo: Arc<dyn PublisherRepository>,
    article_repo: Arc<dyn ArticleRepository>,
}

impl PublisherService {
    pub fn new(repo: Arc<dyn PublisherRepository>, article_repo: Arc<dyn ArticleRepository>) -> Self {
        Self { repo, article_repo }
    }

    /// All publishers with the caller's article counts
    pub async fn list(&self, user_id: i64) -> Result<Vec<Publisher>, PublisherServiceError> {
        Ok(self.repo.list_with_counts(user_id).await?)
    }

    /// A publisher with the caller's articles, newest first
    pub async fn get_with_articles(
        &self,
        id: i64,
        user_id: i64,
    ) -> Result<PublisherWithArticles, PublisherServiceError> {
        let mut publisher = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or(PublisherServiceError::NotFound)?;
        let articles = self.article_repo.list_by_publisher(id, user_id).await?;
        publisher.article_count = articles.len() as i64;
        Ok(PublisherWithArticles { publisher, articles })
    }

    /// Find or create by trimmed name; the flag is true when created
    pub async fn find_or_create(&self, name: Option<&str>) -> Result<(Publisher, bool), PublisherServiceError> {
        let name = validate_name(name, "name")?;
        Ok(self.repo.find_or_create(&name).await?)
    }

    pub async fn rename(&self, id: i64, name: Option<&str>) -> Result<Publisher, PublisherServiceError> {
        let name = validate_name(name, "name")?;
        if self.repo.get_by_id(id).await?.is_none() {
            return Err(PublisherServiceError::NotFound);
        }
        if let Some(existing) = self.repo.get_by_name(&name).await? {
            if existing.id != id {
                return Err(PublisherServiceError::DuplicateName);
            }
        }
        self.repo.rename(id, &name).await?;
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(PublisherServiceError::NotFound)
    }

    /// Delete a publisher and all of its article links
    pub async fn delete(&self, id: i64) -> Result<(), PublisherServiceError> {
        if !self.repo.delete(id).await? {
            return Err(PublisherServiceError::NotFound);
        }
        Ok(())
    }

    /// Link a publisher (created on first use) to the caller's article
    pub async fn link_article(
        &self,
        article_id: i64,
        user_id: i64,
        publisher_name: Option<&str>,
    ) -> Result<Publisher, PublisherServiceError> {
        let name = validate_name(publisher_name, "publisherName")?;
        if self.article_repo.get_for_user(article_id, user_id).await?.is_none() {
            return Err(PublisherServiceError::ArticleNotFound);
        }
        let (publisher, _) = self.repo.find_or_create(&name).await?;
        self.repo.link_article(article_id, publisher.id).await?;
        Ok(publisher)
    }

    pub async fn unlink_article(
        &self,
        article_id: i64,
        user_id: i64,
        publisher_id: i64,
    ) -> Result<(), PublisherServiceError> {
        if self.article_repo.get_for_user(article_id, user_id).await?.is_none() {
            return Err(PublisherServiceError::ArticleNotFound);
        }
        if !self.repo.unlink_article(article_id, publisher_id).await? {
            return Err(PublisherServiceError::AssociationNotFound);
        }
        Ok(())
    }

    /// Publishers whose name contains `query`, by name
    pub async fn search(&self, query: &str) -> Result<Vec<Publisher>, PublisherServiceError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.repo.search(query, SEARCH_LIMIT).await?)
    }
}

fn validate_name(name: Option<&str>, field: &str) -> Result<String, PublisherServiceError> {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(PublisherServiceError::ValidationError(vec![FieldError::new(
            field,
            "Publisher name is required",
        )])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_article, insert_user, setup_pool};
    use crate::db::repositories::{SqlxArticleRepository, SqlxPublisherRepository};
    use crate::db::DynDatabasePool;

    async fn setup() -> (PublisherService, DynDatabasePool, i64) {
        let pool = setup_pool().await;
        let user_id = insert_user(&pool, "owner@example.com").await;
        let service = PublisherService::new(
            SqlxPublisherRepository::boxed(pool.clone()),
            SqlxArticleRepository::boxed(pool.clone()),
        );
        (service, pool, user_id)
    }

    #[tokio::test]
    async fn test_find_or_create_trims() {
        let (service, _, _) = setup().await;

        let (created, was_created) = service.find_or_create(Some("  Springer ")).await.unwrap();
        assert!(was_created);
        assert_eq!(created.name, "Springer");

        let (again, was_created) = service.find_or_create(Some("Springer")).await.unwrap();
        assert!(!was_created);
        assert_eq!(again.id, created.id);

        assert!(matches!(
            service.find_or_create(Some("  ")).await,
            Err(PublisherServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_rules() {
        let (service, _, _) = setup().await;
        let (a, _) = service.find_or_create(Some("A")).await.unwrap();
        service.find_or_create(Some("B")).await.unwrap();

        assert!(matches!(
            service.rename(a.id, Some("B")).await,
            Err(PublisherServiceError::DuplicateName)
        ));
        assert!(matches!(
            service.rename(9999, Some("C")).await,
            Err(PublisherServiceError::NotFound)
        ));
        assert_eq!(service.rename(a.id, Some("C")).await.unwrap().name, "C");
    }

    #[tokio::test]
    async fn test_link_counts_only_callers_articles() {
        let (service, pool, owner) = setup().await;
        let other = insert_user(&pool, "other@example.com").await;
        let mine = insert_article(&pool, owner, "Mine").await;
        let theirs = insert_article(&pool, other, "Theirs").await;

        let publisher = service.link_article(mine, owner, Some("Nature")).await.unwrap();
        service.link_article(mine, owner, Some("Nature")).await.unwrap();
        service.link_article(theirs, other, Some("Nature")).await.unwrap();

        assert!(matches!(
            service.link_article(theirs, owner, Some("Nature")).await,
            Err(PublisherServiceError::ArticleNotFound)
        ));

        let listed = service.list(owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].article_count, 1);

        let detail = service.get_with_articles(publisher.id, owner).await.unwrap();
        assert_eq!(detail.articles.len(), 1);
        assert_eq!(detail.articles[0].id, mine);

        service.unlink_article(mine, owner, publisher.id).await.unwrap();
        assert!(matches!(
            service.unlink_article(mine, owner, publisher.id).await,
            Err(PublisherServiceError::AssociationNotFound)
        ));
    }

    #[tokio::test]
    async fn test_search_and_delete() {
        let (service, _, _) = setup().await;
        let (wiley, _) = service.find_or_create(Some("Wiley")).await.unwrap();
        service.find_or_create(Some("Wiley-Blackwell")).await.unwrap();
        service.find_or_create(Some("Elsevier")).await.unwrap();

        let found = service.search("wiley").await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "Wiley");
        assert!(service.search(" ").await.unwrap().is_empty());

        service.delete(wiley.id).await.unwrap();
        assert!(matches!(service.delete(wiley.id).await, Err(PublisherServiceError::NotFound)));
    }
}
