//! Billing service
//!
//! Plan listing and the PayPal upgrade flow:
//! 1. `create_order` gets an OAuth token, creates a CAPTURE order and records
//!    a pending payment.
//! 2. The user approves the order on PayPal and is sent back to the frontend.
//! 3. `capture_order` captures it and upgrades the user to the pro plan.

use crate::config::PaypalConfig;
use crate::db::repositories::billing::NewPayment;
use crate::db::repositories::BillingRepository;
use crate::models::{PaymentStatus, Plan, UserPlanKind};
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum BillingServiceError {
    #[error("Payment provider not configured")]
    NotConfigured,

    #[error("orderID is required")]
    OrderIdRequired,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Order already captured")]
    AlreadyCaptured,

    #[error("Payment provider error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Order created on PayPal, waiting for the buyer's approval
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    pub id: String,
    pub approval_url: String,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    links: Vec<OrderLink>,
}

#[derive(Deserialize)]
struct OrderLink {
    rel: String,
    href: String,
}

pub struct BillingService {
    repo: Arc<dyn BillingRepository>,
    http: reqwest::Client,
    paypal: PaypalConfig,
    frontend_url: String,
}

impl BillingService {
    pub fn new(
        repo: Arc<dyn BillingRepository>,
        paypal: PaypalConfig,
        frontend_url: String,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(paypal.timeout_seconds))
            .build()
            .context("Failed to build PayPal HTTP client")?;
        Ok(Self {
            repo,
            http,
            paypal,
            frontend_url,
        })
    }

    /// All plans, cheapest first
    pub async fn plans(&self) -> Result<Vec<Plan>, BillingServiceError> {
        Ok(self.repo.list_plans().await?)
    }

    /// Create a PayPal order for the pro plan and record it as pending
    pub async fn create_order(&self, user_id: i64) -> Result<CreatedOrder, BillingServiceError> {
        self.ensure_configured()?;
        let token = self.access_token().await?;

        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": {
                    "currency_code": self.paypal.currency,
                    "value": self.paypal.amount,
                }
            }],
            "application_context": {
                "brand_name": self.paypal.brand_name,
                "landing_page": "LOGIN",
                "user_action": "PAY_NOW",
                "return_url": format!("{}/paypal-success", self.frontend_url),
                "cancel_url": format!("{}/paypal-cancel", self.frontend_url),
            }
        });

        let response = self
            .http
            .post(format!("{}/v2/checkout/orders", self.api_base()))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(upstream)?;
        let order: OrderResponse = check_status(response, "create order").await?.json().await.map_err(upstream)?;

        let approval_url = order
            .links
            .into_iter()
            .find(|link| link.rel == "approve")
            .map(|link| link.href)
            .ok_or_else(|| BillingServiceError::Upstream("No approval URL from PayPal".to_string()))?;

        let amount: f64 = self.paypal.amount.parse().unwrap_or(0.0);
        self.repo
            .create_payment(&NewPayment {
                user_id,
                provider_order_id: &order.id,
                amount,
                currency: &self.paypal.currency,
                payment_method: "paypal",
            })
            .await?;

        tracing::info!(user_id, order_id = %order.id, "PayPal order created");
        Ok(CreatedOrder {
            id: order.id,
            approval_url,
        })
    }

    /// Capture an approved order and upgrade the user to pro
    ///
    /// Returns PayPal's capture response.
    pub async fn capture_order(&self, user_id: i64, order_id: Option<&str>) -> Result<Value, BillingServiceError> {
        self.ensure_configured()?;
        let order_id = order_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(BillingServiceError::OrderIdRequired)?;

        let payment = self
            .repo
            .get_payment_by_order(order_id)
            .await?
            .filter(|payment| payment.user_id == user_id)
            .ok_or(BillingServiceError::OrderNotFound)?;
        if payment.status == PaymentStatus::Completed {
            return Err(BillingServiceError::AlreadyCaptured);
        }

        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!(
                "{}/v2/checkout/orders/{}/capture",
                self.api_base(),
                urlencoding::encode(order_id)
            ))
            .bearer_auth(&token)
            .json(&json!({}))
            .send()
            .await
            .map_err(upstream)?;
        let capture: Value = check_status(response, "capture order").await?.json().await.map_err(upstream)?;

        if capture.get("status").and_then(Value::as_str) != Some("COMPLETED") {
            tracing::warn!(user_id, order_id, "PayPal capture did not complete");
            return Err(BillingServiceError::Upstream("Payment was not completed".to_string()));
        }

        let plan = self
            .repo
            .get_plan_by_name(UserPlanKind::Pro.as_str())
            .await?
            .context("Pro plan is missing from the plans table")?;
        let start = Utc::now();
        let end = start + Duration::days(plan.duration_days);
        self.repo
            .complete_upgrade(payment.id, user_id, &plan, start, end)
            .await?;

        tracing::info!(user_id, order_id, "Payment captured, user upgraded to pro");
        Ok(capture)
    }

    fn ensure_configured(&self) -> Result<(), BillingServiceError> {
        if self.paypal.is_configured() {
            Ok(())
        } else {
            Err(BillingServiceError::NotConfigured)
        }
    }

    fn api_base(&self) -> &str {
        self.paypal.api_base.trim_end_matches('/')
    }

    async fn access_token(&self) -> Result<String, BillingServiceError> {
        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.api_base()))
            .basic_auth(&self.paypal.client_id, Some(&self.paypal.secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(upstream)?;
        let token: AccessTokenResponse = check_status(response, "authenticate")
            .await?
            .json()
            .await
            .map_err(upstream)?;
        Ok(token.access_token)
    }
}

fn upstream(err: reqwest::Error) -> BillingServiceError {
    tracing::warn!(error = %err, "PayPal request failed");
    BillingServiceError::Upstream(err.to_string())
}

async fn check_status(response: reqwest::Response, action: &str) -> Result<reqwest::Response, BillingServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let details = response.text().await.unwrap_or_default();
    tracing::warn!(status = %status, action, details = %details, "PayPal returned an error");
    Err(BillingServiceError::Upstream(format!("Failed to {} ({})", action, status)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::{SqlxBillingRepository, SqlxUserRepository, UserRepository};
    use crate::db::DynDatabasePool;
    use axum::{extract::Path, http::StatusCode, routing::post, Json, Router};

    async fn spawn_paypal() -> String {
        let app = Router::new()
            .route(
                "/v1/oauth2/token",
                post(|| async { Json(json!({"access_token": "token-123", "token_type": "Bearer"})) }),
            )
            .route(
                "/v2/checkout/orders",
                post(|| async {
                    Json(json!({
                        "id": "ORDER-1",
                        "status": "CREATED",
                        "links": [
                            {"rel": "self", "href": "https://paypal.test/self"},
                            {"rel": "approve", "href": "https://paypal.test/approve/ORDER-1"}
                        ]
                    }))
                }),
            )
            .route(
                "/v2/checkout/orders/{id}/capture",
                post(|Path(id): Path<String>| async move {
                    if id == "ORDER-1" {
                        Ok(Json(json!({"id": id, "status": "COMPLETED"})))
                    } else {
                        Err(StatusCode::UNPROCESSABLE_ENTITY)
                    }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn configured(api_base: String) -> PaypalConfig {
        PaypalConfig {
            api_base,
            client_id: "client".to_string(),
            secret: "secret".to_string(),
            ..Default::default()
        }
    }

    async fn setup(paypal: PaypalConfig) -> (BillingService, DynDatabasePool, i64) {
        let pool = setup_pool().await;
        let user_id = insert_user(&pool, "buyer@example.com").await;
        let service = BillingService::new(
            SqlxBillingRepository::boxed(pool.clone()),
            paypal,
            "http://app.test".to_string(),
        )
        .unwrap();
        (service, pool, user_id)
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let (service, _, user_id) = setup(PaypalConfig::default()).await;
        assert!(matches!(
            service.create_order(user_id).await,
            Err(BillingServiceError::NotConfigured)
        ));
        assert!(matches!(
            service.capture_order(user_id, Some("ORDER-1")).await,
            Err(BillingServiceError::NotConfigured)
        ));
        assert_eq!(service.plans().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_and_capture_upgrades_user() {
        let base = spawn_paypal().await;
        let (service, pool, user_id) = setup(configured(base)).await;

        let order = service.create_order(user_id).await.unwrap();
        assert_eq!(
            order,
            CreatedOrder {
                id: "ORDER-1".to_string(),
                approval_url: "https://paypal.test/approve/ORDER-1".to_string(),
            }
        );

        let capture = service.capture_order(user_id, Some("ORDER-1")).await.unwrap();
        assert_eq!(capture["status"], "COMPLETED");

        let user = SqlxUserRepository::new(pool.clone()).get_by_id(user_id).await.unwrap().unwrap();
        assert!(user.is_pro());

        let repo = SqlxBillingRepository::new(pool);
        let active = repo.active_user_plan(user_id).await.unwrap().unwrap();
        assert!(active.active);
        assert_eq!((active.end_date - active.start_date).num_days(), 365);

        assert!(matches!(
            service.capture_order(user_id, Some("ORDER-1")).await,
            Err(BillingServiceError::AlreadyCaptured)
        ));
    }

    #[tokio::test]
    async fn test_stalled_provider_times_out() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut paypal = configured(format!("http://{}", addr));
        paypal.timeout_seconds = 1;
        let (service, _, user_id) = setup(paypal).await;

        let result = tokio::time::timeout(std::time::Duration::from_secs(10), service.create_order(user_id))
            .await
            .expect("PayPal call should give up on its own");
        assert!(matches!(result, Err(BillingServiceError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_capture_requires_own_order() {
        let base = spawn_paypal().await;
        let (service, pool, user_id) = setup(configured(base)).await;
        let other = insert_user(&pool, "other@example.com").await;
        service.create_order(user_id).await.unwrap();

        assert!(matches!(
            service.capture_order(user_id, Some("  ")).await,
            Err(BillingServiceError::OrderIdRequired)
        ));
        assert!(matches!(
            service.capture_order(other, Some("ORDER-1")).await,
            Err(BillingServiceError::OrderNotFound)
        ));
        assert!(matches!(
            service.capture_order(user_id, Some("ORDER-404")).await,
            Err(BillingServiceError::OrderNotFound)
        ));
    }
}
