//! Billing repository
//!
//! Plans, payment records and the plan subscriptions they unlock.

use crate::db::{DynDatabasePool, LastInsertId};
use crate::models::{Payment, PaymentStatus, Plan, UserPlan, UserPlanKind};
use crate::on_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const PLAN_COLUMNS: &str = "id, name, article_limit, price, currency, duration_days, features";

/// A pending payment to record
#[derive(Debug, Clone)]
pub struct NewPayment<'a> {
    pub user_id: i64,
    pub provider_order_id: &'a str,
    pub amount: f64,
    pub currency: &'a str,
    pub payment_method: &'a str,
}

/// Billing repository trait
#[async_trait]
pub trait BillingRepository: Send + Sync {
    /// All plans, cheapest first
    async fn list_plans(&self) -> Result<Vec<Plan>>;

    async fn get_plan_by_name(&self, name: &str) -> Result<Option<Plan>>;

    /// Record a PENDING payment, returning its id
    async fn create_payment(&self, payment: &NewPayment<'_>) -> Result<i64>;

    async fn get_payment_by_order(&self, provider_order_id: &str) -> Result<Option<Payment>>;

    /// Complete a payment and move the user onto `plan` in one transaction.
    ///
    /// Previous subscriptions are deactivated, a new active one covering
    /// `start..end` is inserted and `users.plan` is set to pro.
    async fn complete_upgrade(
        &self,
        payment_id: i64,
        user_id: i64,
        plan: &Plan,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()>;

    /// The user's current active subscription, if any
    async fn active_user_plan(&self, user_id: i64) -> Result<Option<UserPlan>>;
}

/// SQLx-based billing repository implementation
pub struct SqlxBillingRepository {
    pool: DynDatabasePool,
}

impl SqlxBillingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BillingRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BillingRepository for SqlxBillingRepository {
    async fn list_plans(&self) -> Result<Vec<Plan>> {
        let sql = format!("SELECT {} FROM plans ORDER BY price ASC, id ASC", PLAN_COLUMNS);
        let plans = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Plan>(&sql).fetch_all(pool).await
        })
        .context("Failed to list plans")?;
        Ok(plans)
    }

    async fn get_plan_by_name(&self, name: &str) -> Result<Option<Plan>> {
        let sql = format!("SELECT {} FROM plans WHERE name = ?", PLAN_COLUMNS);
        let plan = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Plan>(&sql)
                .bind(name)
                .fetch_optional(pool)
                .await
        })
        .context("Failed to get plan")?;
        Ok(plan)
    }

    async fn create_payment(&self, payment: &NewPayment<'_>) -> Result<i64> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                INSERT INTO payments (user_id, provider_order_id, amount, currency, status,
                    payment_method, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(payment.user_id)
            .bind(payment.provider_order_id)
            .bind(payment.amount)
            .bind(payment.currency)
            .bind(PaymentStatus::Pending.as_str())
            .bind(payment.payment_method)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .map(|result| result.last_id())
        })
        .context("Failed to record payment")?;
        Ok(id)
    }

    async fn get_payment_by_order(&self, provider_order_id: &str) -> Result<Option<Payment>> {
        let payment = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Payment>(
                r#"
                SELECT id, user_id, provider_order_id, amount, currency, status, payment_method,
                    created_at, updated_at
                FROM payments WHERE provider_order_id = ?
                "#,
            )
            .bind(provider_order_id)
            .fetch_optional(pool)
            .await
        })
        .context("Failed to get payment")?;
        Ok(payment)
    }

    async fn complete_upgrade(
        &self,
        payment_id: i64,
        user_id: i64,
        plan: &Plan,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let now = Utc::now();
        on_pool!(self.pool, |pool| {
            let mut tx = pool.begin().await?;

            sqlx::query("UPDATE payments SET status = ?, updated_at = ? WHERE id = ?")
                .bind(PaymentStatus::Completed.as_str())
                .bind(now)
                .bind(payment_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query("UPDATE user_plans SET active = ?, updated_at = ? WHERE user_id = ? AND active = ?")
                .bind(false)
                .bind(now)
                .bind(user_id)
                .bind(true)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                r#"
                INSERT INTO user_plans (user_id, plan_id, payment_id, start_date, end_date, active,
                    created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(plan.id)
            .bind(payment_id)
            .bind(start)
            .bind(end)
            .bind(true)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE users SET plan = ?, updated_at = ? WHERE id = ?")
                .bind(UserPlanKind::Pro.as_str())
                .bind(now)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await
        })
        .context("Failed to complete plan upgrade")?;
        Ok(())
    }

    async fn active_user_plan(&self, user_id: i64) -> Result<Option<UserPlan>> {
        let user_plan = on_pool!(self.pool, |pool| {
            sqlx::query_as::<_, UserPlan>(
                r#"
                SELECT id, user_id, plan_id, payment_id, start_date, end_date, active
                FROM user_plans
                WHERE user_id = ? AND active = ?
                ORDER BY id DESC
                LIMIT 1
                "#,
            )
            .bind(user_id)
            .bind(true)
            .fetch_optional(pool)
            .await
        })
        .context("Failed to get active plan")?;
        Ok(user_plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use chrono::Duration;

    #[tokio::test]
    async fn test_seeded_plans() {
        let pool = setup_pool().await;
        let repo = SqlxBillingRepository::new(pool);

        let plans = repo.list_plans().await.unwrap();
        assert_eq!(
            plans.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["free", "pro"]
        );

        let pro = repo.get_plan_by_name("pro").await.unwrap().unwrap();
        assert_eq!(pro.limit(), None);
        assert_eq!(pro.duration_days, 365);
        assert!((pro.price - 10.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_complete_upgrade() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "pay@example.com").await;
        let repo = SqlxBillingRepository::new(pool.clone());
        let pro = repo.get_plan_by_name("pro").await.unwrap().unwrap();

        let payment_id = repo
            .create_payment(&NewPayment {
                user_id: user,
                provider_order_id: "ORDER-1",
                amount: 10.0,
                currency: "USD",
                payment_method: "paypal",
            })
            .await
            .unwrap();
        let pending = repo.get_payment_by_order("ORDER-1").await.unwrap().unwrap();
        assert_eq!(pending.status, PaymentStatus::Pending);

        let start = Utc::now();
        repo.complete_upgrade(payment_id, user, &pro, start, start + Duration::days(365))
            .await
            .unwrap();
        repo.complete_upgrade(payment_id, user, &pro, start, start + Duration::days(365))
            .await
            .unwrap();

        let completed = repo.get_payment_by_order("ORDER-1").await.unwrap().unwrap();
        assert_eq!(completed.status, PaymentStatus::Completed);

        let active_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_plans WHERE user_id = ? AND active = 1")
                .bind(user)
                .fetch_one(pool.sqlite().unwrap())
                .await
                .unwrap();
        assert_eq!(active_count, 1);

        let active = repo.active_user_plan(user).await.unwrap().unwrap();
        assert_eq!(active.plan_id, pro.id);

        let plan: String = sqlx::query_scalar("SELECT plan FROM users WHERE id = ?")
            .bind(user)
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(plan, "pro");
    }
}
