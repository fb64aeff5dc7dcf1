//! User service
//!
//! Implements account logic:
//! - Registration and login with email + password
//! - Access token issue and verification
//! - Profile reads and partial updates
//! - Setting a password and the forgot/reset password flow

use crate::db::repositories::{PasswordResetRepository, UserRepository};
use crate::models::{CreateUserInput, UpdateProfileInput, User, GENDERS};
use crate::services::email::Mailer;
use crate::services::password::{
    digest_token, generate_reset_token, hash_password, verify_password, MIN_PASSWORD_LENGTH,
};
use crate::services::token::{Claims, TokenError, TokenService};
use crate::services::validation::{is_valid_email, normalize_email, FieldError, FieldErrors};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Validation failed")]
    ValidationError(Vec<FieldError>),

    #[error("Email in use")]
    EmailInUse,

    /// Unknown email and wrong password are reported identically
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    NotFound,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Registration request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterInput {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Login request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// A signed-in user and their access token
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// User service for accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    reset_repo: Arc<dyn PasswordResetRepository>,
    tokens: TokenService,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
    reset_ttl: Duration,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        reset_repo: Arc<dyn PasswordResetRepository>,
        tokens: TokenService,
        mailer: Arc<dyn Mailer>,
        frontend_url: String,
        reset_ttl_minutes: i64,
    ) -> Self {
        Self {
            user_repo,
            reset_repo,
            tokens,
            mailer,
            frontend_url,
            reset_ttl: Duration::minutes(reset_ttl_minutes),
        }
    }

    /// Register a new user on the free plan
    ///
    /// # Errors
    ///
    /// - `ValidationError` for an empty name, malformed email or short password
    /// - `EmailInUse` if the email is already registered
    /// - `InternalError` for database errors
    pub async fn register(&self, input: RegisterInput) -> Result<AuthSession, UserServiceError> {
        let name = input.name.trim().to_string();
        let email = normalize_email(&input.email);

        let mut errors = FieldErrors::new();
        if name.is_empty() {
            errors.add("name", "Name is required");
        } else if name.chars().count() > 120 {
            errors.add("name", "Name must be at most 120 characters");
        }
        if !is_valid_email(&email) {
            errors.add("email", "Valid email is required");
        }
        if input.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add("password", "Password must be at least 6 characters");
        }
        errors.finish().map_err(UserServiceError::ValidationError)?;

        if self.user_repo.get_by_email(&email).await?.is_some() {
            return Err(UserServiceError::EmailInUse);
        }

        let password_hash = hash_password(&input.password)?;
        let user = self
            .user_repo
            .create(&CreateUserInput {
                name,
                email,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = user.id, "User registered");
        let token = self.tokens.issue(user.id)?;
        Ok(AuthSession { token, user })
    }

    /// Check credentials and issue a token
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a malformed email or missing password
    /// - `InvalidCredentials` for an unknown email, a wrong password, or an
    ///   account without a password
    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, UserServiceError> {
        let email = normalize_email(&input.email);

        let mut errors = FieldErrors::new();
        if !is_valid_email(&email) {
            errors.add("email", "Valid email is required");
        }
        if input.password.is_empty() {
            errors.add("password", "Password is required");
        }
        errors.finish().map_err(UserServiceError::ValidationError)?;

        let user = self
            .user_repo
            .get_by_email(&email)
            .await?
            .ok_or(UserServiceError::InvalidCredentials)?;

        let hash = user
            .password_hash
            .as_deref()
            .ok_or(UserServiceError::InvalidCredentials)?;
        if !verify_password(&input.password, hash)? {
            return Err(UserServiceError::InvalidCredentials);
        }

        let token = self.tokens.issue(user.id)?;
        Ok(AuthSession { token, user })
    }

    /// Verify an access token
    pub fn verify_token(&self, token: &str) -> Result<Claims, UserServiceError> {
        Ok(self.tokens.verify(token)?)
    }

    /// Get a user by ID
    pub async fn get_by_id(&self, id: i64) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    /// Apply the supplied profile fields
    pub async fn update_profile(
        &self,
        id: i64,
        mut input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        let mut errors = FieldErrors::new();

        if let Some(name) = input.name.as_mut() {
            *name = name.trim().to_string();
            if name.is_empty() {
                errors.add("name", "Name cannot be empty");
            }
        }
        if let Some(email) = input.email.as_mut() {
            *email = normalize_email(email);
            if !is_valid_email(email) {
                errors.add("email", "Valid email is required");
            }
        }
        if let Some(gender) = input.gender.as_deref() {
            if !GENDERS.contains(&gender) {
                errors.add("gender", "Gender must be Male, Female or Other");
            }
        }
        errors.finish().map_err(UserServiceError::ValidationError)?;

        if let Some(email) = input.email.as_deref() {
            if let Some(existing) = self.user_repo.get_by_email(email).await? {
                if existing.id != id {
                    return Err(UserServiceError::EmailInUse);
                }
            }
        }

        self.user_repo
            .update_profile(id, &input)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    /// Set a new password for a signed-in user
    pub async fn set_password(&self, id: i64, password: &str) -> Result<(), UserServiceError> {
        validate_new_password(password)?;
        let hash = hash_password(password)?;
        if !self.user_repo.set_password(id, &hash).await? {
            return Err(UserServiceError::NotFound);
        }
        Ok(())
    }

    /// Start the reset flow. Succeeds silently for unknown addresses.
    pub async fn forgot_password(&self, email: &str) -> Result<(), UserServiceError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(UserServiceError::ValidationError(vec![FieldError::new(
                "email",
                "Valid email is required",
            )]));
        }

        let Some(user) = self.user_repo.get_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let (token, digest) = generate_reset_token();
        self.reset_repo
            .create(user.id, &digest, Utc::now() + self.reset_ttl)
            .await?;

        let reset_url = format!(
            "{}/reset-password?token={}",
            self.frontend_url,
            urlencoding::encode(&token)
        );
        self.mailer
            .send_password_reset(&user.email, &user.name, &reset_url)
            .await?;
        Ok(())
    }

    /// Finish the reset flow with the mailed token
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), UserServiceError> {
        validate_new_password(password)?;

        let reset = self
            .reset_repo
            .get_by_hash(&digest_token(token.trim()))
            .await?
            .filter(|reset| reset.is_usable(Utc::now()))
            .ok_or(UserServiceError::InvalidResetToken)?;

        if !self.reset_repo.mark_used(reset.id).await? {
            return Err(UserServiceError::InvalidResetToken);
        }

        let hash = hash_password(password)?;
        if !self.user_repo.set_password(reset.user_id, &hash).await? {
            return Err(UserServiceError::NotFound);
        }

        tracing::info!(user_id = reset.user_id, "Password reset completed");
        Ok(())
    }

    /// Remove used and expired reset tokens
    pub async fn purge_stale_resets(&self) -> Result<u64, UserServiceError> {
        Ok(self.reset_repo.delete_stale(Utc::now()).await?)
    }
}

fn validate_new_password(password: &str) -> Result<(), UserServiceError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(UserServiceError::ValidationError(vec![FieldError::new(
            "password",
            "Password must be at least 6 characters",
        )]));
    }
    Ok(())
}
