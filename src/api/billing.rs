//! Billing API endpoints
//!
//! - GET /v1/plans - Available plans
//! - POST /v1/paypal/create-order - Start a pro upgrade
//! - POST /v1/paypal/capture-order - Capture an approved order and upgrade

use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::error::AppError;
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::Plan;
use crate::services::CreatedOrder;

#[derive(Debug, Default, Deserialize)]
pub struct CaptureOrderRequest {
    #[serde(default, rename = "orderID", alias = "orderId")]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CaptureOrderResponse {
    pub status: &'static str,
    pub message: String,
    /// PayPal's capture response
    pub paypal: Value,
}

pub fn plans_router() -> Router<AppState> {
    Router::new().route("/", get(list_plans))
}

/// Requires auth
pub fn paypal_router() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(create_order))
        .route("/capture-order", post(capture_order))
}

async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<Plan>>, AppError> {
    Ok(Json(state.billing_service.plans().await?))
}

async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<CreatedOrder>, AppError> {
    Ok(Json(state.billing_service.create_order(user.id).await?))
}

async fn capture_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CaptureOrderRequest>,
) -> Result<Json<CaptureOrderResponse>, AppError> {
    let paypal = state
        .billing_service
        .capture_order(user.id, body.order_id.as_deref())
        .await?;
    Ok(Json(CaptureOrderResponse {
        status: "success",
        message: "Payment captured, your account has been upgraded to Pro".to_string(),
        paypal,
    }))
}
