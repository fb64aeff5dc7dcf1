//! Article service
//!
//! Implements business logic for a user's saved articles:
//! - Create, read, update, delete, always scoped to the owner
//! - Validation of title and URL
//! - Plan article limits
//! - Tag links from `tags` and `hashtags`
//! - Summary normalization

use crate::db::repositories::{ArticleRepository, BillingRepository, TagRepository, UserRepository};
use crate::models::{parse_hashtags, Article, ArticleInput, LibraryInfo, UserPlanKind};
use crate::services::summary::{self, NormalizedSummary};
use crate::services::validation::{is_valid_url, FieldError, FieldErrors};
use std::collections::HashMap;
use std::sync::Arc;

const MAX_TITLE_LENGTH: usize = 500;

/// Error types for article service operations
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    #[error("Article not found")]
    NotFound,

    #[error("Validation failed")]
    ValidationError(Vec<FieldError>),

    /// The owner's plan does not allow more articles
    #[error("Article limit reached. Free accounts can save up to {0} articles.")]
    LimitReached(i64),

    #[error("User not found")]
    UserNotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Article service for a user's library
pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    tag_repo: Arc<dyn TagRepository>,
    user_repo: Arc<dyn UserRepository>,
    billing_repo: Arc<dyn BillingRepository>,
    free_article_limit: i64,
}

impl ArticleService {
    /// Create a new article service
    ///
    /// `free_article_limit` applies to free users when the plans table has no
    /// `free` row.
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        tag_repo: Arc<dyn TagRepository>,
        user_repo: Arc<dyn UserRepository>,
        billing_repo: Arc<dyn BillingRepository>,
        free_article_limit: i64,
    ) -> Self {
        Self {
            repo,
            tag_repo,
            user_repo,
            billing_repo,
            free_article_limit,
        }
    }

    /// Save a new article for `user_id`
    ///
    /// # Errors
    ///
    /// - `ValidationError` if the title is empty or the URL is not http(s)
    /// - `LimitReached` if the owner's plan is full
    pub async fn create(&self, user_id: i64, mut input: ArticleInput) -> Result<Article, ArticleServiceError> {
        normalize_input(&mut input, false);
        validate_input(&input)?;

        if let Some(limit) = self.article_limit(user_id).await? {
            let count = self.repo.count_by_user(user_id).await?;
            if count >= limit {
                tracing::info!(user_id, limit, "Article limit reached");
                return Err(ArticleServiceError::LimitReached(limit));
            }
        }

        let mut article = self.repo.create(user_id, &input).await?;
        self.link_tags(article.id, &input).await?;
        article.tags = self.tag_repo.get_by_article_id(article.id).await?;

        tracing::debug!(article_id = article.id, user_id, "Article created");
        Ok(article)
    }

    /// Get one of the owner's articles with its tags
    pub async fn get(&self, id: i64, user_id: i64) -> Result<Article, ArticleServiceError> {
        let mut article = self
            .repo
            .get_for_user(id, user_id)
            .await?
            .ok_or(ArticleServiceError::NotFound)?;
        article.tags = self.tag_repo.get_by_article_id(article.id).await?;
        Ok(article)
    }

    /// The owner's articles, newest first
    pub async fn list(&self, user_id: i64) -> Result<Vec<Article>, ArticleServiceError> {
        let articles = self.repo.list_by_user(user_id).await?;
        self.with_tags(articles).await
    }

    /// Update the owner's article
    ///
    /// Optional fields left out (or null) keep their stored value; an empty
    /// string clears a text field.
    pub async fn update(
        &self,
        id: i64,
        user_id: i64,
        mut input: ArticleInput,
    ) -> Result<Article, ArticleServiceError> {
        normalize_input(&mut input, true);
        validate_input(&input)?;

        if !self.repo.update_for_user(id, user_id, &input).await? {
            return Err(ArticleServiceError::NotFound);
        }

        if input.tags.is_some() || input.hashtags.is_some() {
            self.tag_repo.clear_article(id).await?;
            self.link_tags(id, &input).await?;
        }

        self.get(id, user_id).await
    }

    /// Delete the owner's article
    pub async fn delete(&self, id: i64, user_id: i64) -> Result<(), ArticleServiceError> {
        if !self.repo.delete_for_user(id, user_id).await? {
            return Err(ArticleServiceError::NotFound);
        }
        tracing::debug!(article_id = id, user_id, "Article deleted");
        Ok(())
    }

    /// Plan, article count and limit for the owner
    pub async fn library_info(&self, user_id: i64) -> Result<LibraryInfo, ArticleServiceError> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(ArticleServiceError::UserNotFound)?;

        Ok(LibraryInfo {
            plan: user.plan.to_string(),
            article_count: self.repo.count_by_user(user_id).await?,
            article_limit: self.limit_for_plan(user.plan).await?,
        })
    }

    /// Normalized summary of the owner's article
    pub async fn summary(&self, id: i64, user_id: i64) -> Result<NormalizedSummary, ArticleServiceError> {
        let article = self
            .repo
            .get_for_user(id, user_id)
            .await?
            .ok_or(ArticleServiceError::NotFound)?;
        Ok(summary::normalize(article.summary.as_deref().unwrap_or_default()))
    }

    /// Record the stored PDF for the owner's article
    pub async fn attach_file(&self, id: i64, user_id: i64, file_name: &str) -> Result<(), ArticleServiceError> {
        if !self.repo.set_file_name(id, user_id, file_name).await? {
            return Err(ArticleServiceError::NotFound);
        }
        Ok(())
    }

    /// Load tags for a batch of articles with one query
    pub async fn with_tags(&self, mut articles: Vec<Article>) -> Result<Vec<Article>, ArticleServiceError> {
        if articles.is_empty() {
            return Ok(articles);
        }

        let ids: Vec<i64> = articles.iter().map(|a| a.id).collect();
        let mut by_article: HashMap<i64, Vec<_>> = HashMap::new();
        for (article_id, tag) in self.tag_repo.get_for_articles(&ids).await? {
            by_article.entry(article_id).or_default().push(tag);
        }

        for article in &mut articles {
            article.tags = by_article.remove(&article.id).unwrap_or_default();
        }
        Ok(articles)
    }

    async fn article_limit(&self, user_id: i64) -> Result<Option<i64>, ArticleServiceError> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(ArticleServiceError::UserNotFound)?;
        self.limit_for_plan(user.plan).await
    }

    async fn limit_for_plan(&self, plan: UserPlanKind) -> Result<Option<i64>, ArticleServiceError> {
        match self.billing_repo.get_plan_by_name(plan.as_str()).await? {
            Some(plan) => Ok(plan.limit()),
            None if plan == UserPlanKind::Free && self.free_article_limit > 0 => {
                Ok(Some(self.free_article_limit))
            }
            None => Ok(None),
        }
    }

    async fn link_tags(&self, article_id: i64, input: &ArticleInput) -> Result<(), ArticleServiceError> {
        for name in tag_names(input) {
            let tag = self.tag_repo.find_or_create(&name).await?;
            self.tag_repo.add_to_article(tag.id, article_id).await?;
        }
        Ok(())
    }
}

/// Tag names from the explicit list and the hashtag string, deduplicated
fn tag_names(input: &ArticleInput) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let explicit = input.tags.iter().flatten().map(|t| t.trim().trim_start_matches('#').to_string());
    let hashtags = input.hashtags.as_deref().map(parse_hashtags).unwrap_or_default();

    for name in explicit.chain(hashtags) {
        if !name.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
            names.push(name);
        }
    }
    names
}

/// Trim text fields; blanks become `None` unless `keep_blank` is set
fn normalize_input(input: &mut ArticleInput, keep_blank: bool) {
    input.title = input.title.trim().to_string();
    input.url = input.url.trim().to_string();
    for field in [
        &mut input.authors,
        &mut input.journal,
        &mut input.doi,
        &mut input.abstract_text,
    ] {
        if let Some(value) = field.take() {
            let value = value.trim();
            if keep_blank || !value.is_empty() {
                *field = Some(value.to_string());
            }
        }
    }
}

fn validate_input(input: &ArticleInput) -> Result<(), ArticleServiceError> {
    let mut errors = FieldErrors::new();
    if input.title.is_empty() {
        errors.add("title", "Title is required");
    } else if input.title.chars().count() > MAX_TITLE_LENGTH {
        errors.add("title", "Title must be at most 500 characters");
    }
    if !is_valid_url(&input.url) {
        errors.add("url", "Valid URL is required");
    }
    errors.finish().map_err(ArticleServiceError::ValidationError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::{
        SqlxArticleRepository, SqlxBillingRepository, SqlxTagRepository, SqlxUserRepository,
    };
    use crate::db::DynDatabasePool;

    async fn setup() -> (ArticleService, DynDatabasePool, i64) {
        let pool = setup_pool().await;
        let user_id = insert_user(&pool, "reader@example.com").await;
        let service = ArticleService::new(
            SqlxArticleRepository::boxed(pool.clone()),
            SqlxTagRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            SqlxBillingRepository::boxed(pool.clone()),
            10,
        );
        (service, pool, user_id)
    }

    #[tokio::test]
    async fn test_create_validates_title_and_url() {
        let (service, _, user_id) = setup().await;

        let err = service
            .create(user_id, ArticleInput::new("  ", "not a url"))
            .await
            .unwrap_err();
        match err {
            ArticleServiceError::ValidationError(errors) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].field, "title");
                assert_eq!(errors[1].field, "url");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_links_tags_and_hashtags() {
        let (service, _, user_id) = setup().await;

        let mut input = ArticleInput::new("Attention Is All You Need", "https://arxiv.org/abs/1706.03762");
        input.tags = Some(vec!["NLP".to_string(), " transformers ".to_string()]);
        input.hashtags = Some("#DeepLearning #nlp".to_string());

        let article = service.create(user_id, input).await.unwrap();
        let names: Vec<&str> = article.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"NLP"));
        assert!(names.contains(&"transformers"));
        assert!(names.contains(&"DeepLearning"));
    }

    #[tokio::test]
    async fn test_free_plan_limit() {
        let (service, _, user_id) = setup().await;

        for i in 0..10 {
            service
                .create(user_id, ArticleInput::new(format!("Paper {}", i), "https://example.com"))
                .await
                .unwrap();
        }

        let err = service
            .create(user_id, ArticleInput::new("One too many", "https://example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArticleServiceError::LimitReached(10)));
        assert_eq!(
            err.to_string(),
            "Article limit reached. Free accounts can save up to 10 articles."
        );
    }

    #[tokio::test]
    async fn test_pro_plan_is_unlimited() {
        let (service, pool, user_id) = setup().await;
        SqlxUserRepository::new(pool)
            .set_plan(user_id, UserPlanKind::Pro)
            .await
            .unwrap();

        for i in 0..11 {
            service
                .create(user_id, ArticleInput::new(format!("Paper {}", i), "https://example.com"))
                .await
                .unwrap();
        }

        let info = service.library_info(user_id).await.unwrap();
        assert_eq!(info.plan, "pro");
        assert_eq!(info.article_count, 11);
        assert_eq!(info.article_limit, None);
    }

    #[tokio::test]
    async fn test_library_info_free() {
        let (service, _, user_id) = setup().await;
        let info = service.library_info(user_id).await.unwrap();
        assert_eq!(
            info,
            LibraryInfo {
                plan: "free".to_string(),
                article_count: 0,
                article_limit: Some(10),
            }
        );
    }

    #[tokio::test]
    async fn test_ownership_scoping() {
        let (service, pool, owner) = setup().await;
        let other = insert_user(&pool, "other@example.com").await;

        let article = service
            .create(owner, ArticleInput::new("Mine", "https://example.com"))
            .await
            .unwrap();

        assert!(matches!(service.get(article.id, other).await, Err(ArticleServiceError::NotFound)));
        assert!(matches!(
            service
                .update(article.id, other, ArticleInput::new("Stolen", "https://example.com"))
                .await,
            Err(ArticleServiceError::NotFound)
        ));
        assert!(matches!(service.delete(article.id, other).await, Err(ArticleServiceError::NotFound)));
        assert!(service.list(other).await.unwrap().is_empty());

        service.delete(article.id, owner).await.unwrap();
        assert!(matches!(service.get(article.id, owner).await, Err(ArticleServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_replaces_tags() {
        let (service, _, user_id) = setup().await;
        let mut input = ArticleInput::new("Paper", "https://example.com");
        input.tags = Some(vec!["Old".to_string()]);
        let article = service.create(user_id, input).await.unwrap();

        let mut update = ArticleInput::new("Paper v2", "https://example.com/v2");
        update.tags = Some(vec!["New".to_string()]);
        let updated = service.update(article.id, user_id, update).await.unwrap();

        assert_eq!(updated.title, "Paper v2");
        assert_eq!(updated.tags.len(), 1);
        assert_eq!(updated.tags[0].name, "New");

        let untouched = service
            .update(article.id, user_id, ArticleInput::new("Paper v3", "https://example.com/v3"))
            .await
            .unwrap();
        assert_eq!(untouched.tags.len(), 1);
    }

    #[tokio::test]
    async fn test_update_keeps_fields_left_out() {
        let (service, _, user_id) = setup().await;
        let mut input = ArticleInput::new("Paper", "https://example.com");
        input.authors = Some("Ada Lovelace".to_string());
        input.journal = Some("Nature".to_string());
        input.doi = Some("10.1/x".to_string());
        input.price = Some(12.5);
        let article = service.create(user_id, input).await.unwrap();

        let updated = service
            .update(article.id, user_id, ArticleInput::new("Paper v2", "https://example.com"))
            .await
            .unwrap();
        assert_eq!(updated.title, "Paper v2");
        assert_eq!(updated.authors.as_deref(), Some("Ada Lovelace"));
        assert_eq!(updated.journal.as_deref(), Some("Nature"));
        assert_eq!(updated.doi.as_deref(), Some("10.1/x"));
        assert_eq!(updated.price, Some(12.5));

        let mut clear = ArticleInput::new("Paper v2", "https://example.com");
        clear.journal = Some("  ".to_string());
        let cleared = service.update(article.id, user_id, clear).await.unwrap();
        assert_eq!(cleared.journal, None);
        assert_eq!(cleared.authors.as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test]
    async fn test_list_newest_first_with_tags() {
        let (service, _, user_id) = setup().await;
        let mut first = ArticleInput::new("First", "https://example.com/1");
        first.tags = Some(vec!["A".to_string()]);
        service.create(user_id, first).await.unwrap();
        service
            .create(user_id, ArticleInput::new("Second", "https://example.com/2"))
            .await
            .unwrap();

        let articles = service.list(user_id).await.unwrap();
        assert_eq!(articles[0].title, "Second");
        assert!(articles[0].tags.is_empty());
        assert_eq!(articles[1].tags[0].name, "A");
    }

    #[tokio::test]
    async fn test_summary_normalized() {
        let (service, _, user_id) = setup().await;
        let mut input = ArticleInput::new("Paper", "https://example.com");
        input.summary = Some("- one\n- two".to_string());
        let article = service.create(user_id, input).await.unwrap();

        let summary = service.summary(article.id, user_id).await.unwrap();
        assert_eq!(summary.format, summary::SummaryFormat::Markdown);
        assert!(summary.html.contains("<li>one</li>"));

        let empty = service
            .create(user_id, ArticleInput::new("No summary", "https://example.com"))
            .await
            .unwrap();
        assert_eq!(service.summary(empty.id, user_id).await.unwrap().html, "");
    }

    #[test]
    fn test_tag_names_dedupes() {
        let mut input = ArticleInput::new("t", "https://example.com");
        input.tags = Some(vec!["#ML".to_string(), "".to_string(), "ml".to_string()]);
        input.hashtags = Some("#Vision".to_string());
        assert_eq!(tag_names(&input), vec!["ML".to_string(), "Vision".to_string()]);
    }
}
