//! Billing models: plans, payments and plan subscriptions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Purchasable plan; `article_limit` 0 means unlimited
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub article_limit: i64,
    pub price: f64,
    pub currency: String,
    pub duration_days: i64,
    pub features: Option<String>,
}

impl Plan {
    /// Effective limit, `None` when unlimited
    pub fn limit(&self) -> Option<i64> {
        (self.article_limit > 0).then_some(self.article_limit)
    }
}

/// Payment lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "CANCELLED" => Ok(PaymentStatus::Cancelled),
            other => Err(format!("Unknown payment status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub provider_order_id: String,
    pub amount: f64,
    pub currency: String,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's subscription to a plan for a period
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserPlan {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: i64,
    pub payment_id: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_limit() {
        let mut plan = Plan {
            id: 1,
            name: "free".to_string(),
            article_limit: 10,
            price: 0.0,
            currency: "USD".to_string(),
            duration_days: 0,
            features: None,
        };
        assert_eq!(plan.limit(), Some(10));
        plan.article_limit = 0;
        assert_eq!(plan.limit(), None);
    }

    #[test]
    fn test_payment_status_roundtrip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Cancelled,
        ] {
            assert_eq!(PaymentStatus::try_from(status.as_str().to_string()), Ok(status));
        }
    }
}
