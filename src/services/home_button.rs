//! Home page buttons shown in the SPA header and footer

use crate::db::repositories::HomeButtonRepository;
use crate::models::{HomeButton, HomeButtonInput, BUTTON_POSITIONS};
use crate::services::validation::{FieldError, FieldErrors};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum HomeButtonServiceError {
    #[error("Not found")]
    NotFound,

    #[error("Validation failed")]
    ValidationError(Vec<FieldError>),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct HomeButtonService {
    repo: Arc<dyn HomeButtonRepository>,
}

impl HomeButtonService {
    pub fn new(repo: Arc<dyn HomeButtonRepository>) -> Self {
        Self { repo }
    }

    /// Buttons by id, optionally only one position
    pub async fn list(&self, position: Option<&str>) -> Result<Vec<HomeButton>, HomeButtonServiceError> {
        let position = position.map(str::trim).filter(|p| !p.is_empty());
        if let Some(position) = position {
            validate_position(position)?;
        }
        Ok(self.repo.list(position).await?)
    }

    pub async fn create(&self, input: &HomeButtonInput) -> Result<HomeButton, HomeButtonServiceError> {
        let (name, position) = validate(input)?;
        Ok(self.repo.create(&name, &position).await?)
    }

    pub async fn update(&self, id: i64, input: &HomeButtonInput) -> Result<HomeButton, HomeButtonServiceError> {
        let (name, position) = validate(input)?;
        if !self.repo.update(id, &name, &position).await? {
            return Err(HomeButtonServiceError::NotFound);
        }
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(HomeButtonServiceError::NotFound)
    }

    pub async fn delete(&self, id: i64) -> Result<(), HomeButtonServiceError> {
        if !self.repo.delete(id).await? {
            return Err(HomeButtonServiceError::NotFound);
        }
        Ok(())
    }
}

fn validate(input: &HomeButtonInput) -> Result<(String, String), HomeButtonServiceError> {
    let name = input.name.as_deref().map(str::trim).unwrap_or_default();
    let position = input.position.as_deref().map(str::trim).unwrap_or_default();

    let mut errors = FieldErrors::new();
    if name.is_empty() {
        errors.add("name", "Name is required");
    }
    if !BUTTON_POSITIONS.contains(&position) {
        errors.add("position", "Position must be header or footer");
    }
    errors.finish().map_err(HomeButtonServiceError::ValidationError)?;

    Ok((name.to_string(), position.to_string()))
}

fn validate_position(position: &str) -> Result<(), HomeButtonServiceError> {
    if BUTTON_POSITIONS.contains(&position) {
        Ok(())
    } else {
        Err(HomeButtonServiceError::ValidationError(vec![FieldError::new(
            "position",
            "Position must be header or footer",
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;
    use crate::db::repositories::SqlxHomeButtonRepository;

    fn input(name: &str, position: &str) -> HomeButtonInput {
        HomeButtonInput {
            name: Some(name.to_string()),
            position: Some(position.to_string()),
        }
    }

    #[tokio::test]
    async fn test_crud_and_filter() {
        let service = HomeButtonService::new(SqlxHomeButtonRepository::boxed(setup_pool().await));

        let about = service.create(&input("About", "header")).await.unwrap();
        service.create(&input("Contact", "footer")).await.unwrap();

        assert_eq!(service.list(None).await.unwrap().len(), 2);
        let header = service.list(Some("header")).await.unwrap();
        assert_eq!(header.len(), 1);
        assert_eq!(header[0].name, "About");

        let moved = service.update(about.id, &input("About us", "footer")).await.unwrap();
        assert_eq!(moved.position, "footer");

        service.delete(about.id).await.unwrap();
        assert!(matches!(service.delete(about.id).await, Err(HomeButtonServiceError::NotFound)));
        assert!(matches!(
            service.update(about.id, &input("Gone", "header")).await,
            Err(HomeButtonServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_validation() {
        let service = HomeButtonService::new(SqlxHomeButtonRepository::boxed(setup_pool().await));

        match service.create(&input(" ", "sidebar")).await {
            Err(HomeButtonServiceError::ValidationError(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            service.list(Some("sidebar")).await,
            Err(HomeButtonServiceError::ValidationError(_))
        ));
    }
}
