//! Tag service
//!
//! Tags are global; the articles listed under a tag are always the caller's.

use crate::db::repositories::{ArticleRepository, TagRepository};
use crate::models::{Article, Tag};
use crate::services::article::{ArticleService, ArticleServiceError};
use std::sync::Arc;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    #[error("Tag not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ArticleServiceError> for TagServiceError {
    fn from(err: ArticleServiceError) -> Self {
        match err {
            ArticleServiceError::InternalError(e) => TagServiceError::InternalError(e),
            other => TagServiceError::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

pub struct TagService {
    repo: Arc<dyn TagRepository>,
    article_repo: Arc<dyn ArticleRepository>,
    articles: Arc<ArticleService>,
}

impl TagService {
    pub fn new(
        repo: Arc<dyn TagRepository>,
        article_repo: Arc<dyn ArticleRepository>,
        articles: Arc<ArticleService>,
    ) -> Self {
        Self {
            repo,
            article_repo,
            articles,
        }
    }

    /// All tags ordered by name
    pub async fn list(&self) -> Result<Vec<Tag>, TagServiceError> {
        Ok(self.repo.list().await?)
    }

    /// The caller's articles carrying tag `id`
    pub async fn articles(&self, id: i64, user_id: i64) -> Result<Vec<Article>, TagServiceError> {
        if self.repo.get_by_id(id).await?.is_none() {
            return Err(TagServiceError::NotFound);
        }
        let articles = self.article_repo.list_by_tag(id, user_id).await?;
        Ok(self.articles.with_tags(articles).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::{
        SqlxArticleRepository, SqlxBillingRepository, SqlxTagRepository, SqlxUserRepository,
    };
    use crate::models::ArticleInput;

    #[tokio::test]
    async fn test_articles_by_tag_are_scoped() {
        let pool = setup_pool().await;
        let owner = insert_user(&pool, "owner@example.com").await;
        let other = insert_user(&pool, "other@example.com").await;

        let articles = Arc::new(ArticleService::new(
            SqlxArticleRepository::boxed(pool.clone()),
            SqlxTagRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            SqlxBillingRepository::boxed(pool.clone()),
            10,
        ));
        let service = TagService::new(
            SqlxTagRepository::boxed(pool.clone()),
            SqlxArticleRepository::boxed(pool.clone()),
            articles.clone(),
        );

        let mut input = ArticleInput::new("Tagged", "https://example.com");
        input.tags = Some(vec!["Biology".to_string()]);
        articles.create(owner, input.clone()).await.unwrap();
        articles.create(other, input).await.unwrap();

        let tags = service.list().await.unwrap();
        assert_eq!(tags.len(), 1);

        let owned = service.articles(tags[0].id, owner).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].user_id, owner);
        assert_eq!(owned[0].tags[0].name, "Biology");

        assert!(matches!(
            service.articles(9999, owner).await,
            Err(TagServiceError::NotFound)
        ));
    }
}
