//! Author aggregation
//!
//! Authors are not stored as rows. They are derived from the free-text
//! `authors` column of the caller's articles.

use crate::db::repositories::ArticleRepository;
use crate::models::Article;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

static AUTHOR_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,;]|\s+and\s+|\s+&\s+").expect("separator pattern is valid"));

/// One author with the number of the caller's articles naming them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    /// Position in the sorted list, starting at 1
    pub id: usize,
    pub name: String,
    pub article_count: usize,
}

/// Split an author string into trimmed, non-empty names
pub fn split_authors(authors: &str) -> Vec<String> {
    AUTHOR_SEPARATOR
        .split(authors)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Count articles per author name, sorted by name
pub fn aggregate_authors<I, S>(author_strings: I) -> Vec<AuthorSummary>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for authors in author_strings {
        let mut names = split_authors(authors.as_ref());
        names.sort();
        names.dedup();
        for name in names {
            *counts.entry(name).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(index, (name, article_count))| AuthorSummary {
            id: index + 1,
            name,
            article_count,
        })
        .collect()
}

pub struct AuthorService {
    article_repo: Arc<dyn ArticleRepository>,
}

impl AuthorService {
    pub fn new(article_repo: Arc<dyn ArticleRepository>) -> Self {
        Self { article_repo }
    }

    pub async fn list(&self, user_id: i64) -> anyhow::Result<Vec<AuthorSummary>> {
        let strings = self.article_repo.list_author_strings(user_id).await?;
        Ok(aggregate_authors(strings))
    }

    /// The caller's articles whose author text contains `name`, newest first
    pub async fn articles(&self, user_id: i64, name: &str) -> anyhow::Result<Vec<Article>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Vec::new());
        }
        self.article_repo.list_by_author(user_id, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::SqlxArticleRepository;
    use crate::models::ArticleInput;
    use proptest::prelude::*;

    #[test]
    fn test_split_authors() {
        assert_eq!(
            split_authors("Vaswani, Shazeer; Parmar and Uszkoreit & Jones"),
            vec!["Vaswani", "Shazeer", "Parmar", "Uszkoreit", "Jones"]
        );
        assert_eq!(split_authors(" , ;  "), Vec::<String>::new());
        assert_eq!(split_authors("Alexander Anderson"), vec!["Alexander Anderson"]);
    }

    #[test]
    fn test_aggregate_authors() {
        let authors = aggregate_authors(["Smith, Doe", "Doe and Lee", "", "Doe, Doe"]);
        assert_eq!(
            authors,
            vec![
                AuthorSummary { id: 1, name: "Doe".to_string(), article_count: 3 },
                AuthorSummary { id: 2, name: "Lee".to_string(), article_count: 1 },
                AuthorSummary { id: 3, name: "Smith".to_string(), article_count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_service_scopes_to_owner() {
        let pool = setup_pool().await;
        let owner = insert_user(&pool, "owner@example.com").await;
        let other = insert_user(&pool, "other@example.com").await;
        let repo = SqlxArticleRepository::boxed(pool.clone());

        let mut input = ArticleInput::new("Paper", "https://example.com");
        input.authors = Some("Ada Lovelace, Charles Babbage".to_string());
        repo.create(owner, &input).await.unwrap();
        input.authors = Some("Grace Hopper".to_string());
        repo.create(other, &input).await.unwrap();

        let service = AuthorService::new(repo);
        let authors = service.list(owner).await.unwrap();
        let names: Vec<&str> = authors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Ada Lovelace", "Charles Babbage"]);

        assert_eq!(service.articles(owner, "Babbage").await.unwrap().len(), 1);
        assert!(service.articles(owner, "Hopper").await.unwrap().is_empty());
        assert!(service.articles(owner, "  ").await.unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_split_names_are_trimmed(input in "[A-Za-z ,;&]{0,60}") {
            for name in split_authors(&input) {
                prop_assert!(!name.is_empty());
                prop_assert_eq!(name.trim(), name.as_str());
                prop_assert!(!name.contains(','));
                prop_assert!(!name.contains(';'));
            }
        }

        #[test]
        fn prop_ids_are_sequential(input in proptest::collection::vec("[A-Za-z ,]{0,30}", 0..8)) {
            let authors = aggregate_authors(&input);
            for (index, author) in authors.iter().enumerate() {
                prop_assert_eq!(author.id, index + 1);
                prop_assert!(author.article_count >= 1);
            }
        }
    }
}
