//! Authentication API endpoints
//!
//! Handles HTTP requests for user authentication:
//! - POST /v1/auth/register - User registration
//! - POST /v1/auth/login - User login
//! - GET /v1/auth/me - Get current user
//! - POST /v1/auth/set-password - Set a password for the current user
//! - POST /v1/auth/forgot-password - Email a reset link
//! - POST /v1/auth/reset-password - Reset a password with an emailed token

use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::error::AppError;
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::{User, UserPlanKind};
use crate::services::user::{AuthSession, LoginInput, RegisterInput};

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: SessionUser,
}

/// The user as returned next to a fresh token
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub plan: UserPlanKind,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            token: session.token,
            user: SessionUser {
                id: session.user.id,
                name: session.user.name,
                email: session.user.email,
                plan: session.user.plan,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_current_user))
        .route("/set-password", post(set_password))
}

/// POST /v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state.user_service.register(input).await?;
    Ok(Json(session.into()))
}

/// POST /v1/auth/login
///
/// Unknown email and wrong password both answer 400 "Invalid credentials".
async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state.user_service.login(input).await?;
    Ok(Json(session.into()))
}

/// GET /v1/auth/me
async fn get_current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.user_service.get_by_id(user.id).await?))
}

/// POST /v1/auth/set-password
async fn set_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<SetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.user_service.set_password(user.id, &body.password).await?;
    Ok(MessageResponse::new("Password set successfully"))
}

/// POST /v1/auth/forgot-password
///
/// Answers the same way whether or not the email is registered.
async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.user_service.forgot_password(&body.email).await?;
    Ok(MessageResponse::new(
        "If an account exists for that email, a reset link has been sent",
    ))
}

/// POST /v1/auth/reset-password
async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .user_service
        .reset_password(&body.token, &body.password)
        .await?;
    Ok(MessageResponse::new("Password has been reset"))
}
