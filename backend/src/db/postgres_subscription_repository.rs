use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::subscription_repository::SubscriptionRepository;
use crate::models::subscription::{NewSubscription, Subscription, SubscriptionStatus};

pub struct PostgresSubscriptionRepository {
    pub pool: PgPool,
}

const SUBSCRIPTION_COLUMNS: &str = r#"
    id, company_id, plan_id, status, provider, value_cents, cycle, next_due_date,
    stripe_subscription_id, asaas_subscription_id, created_at, updated_at
"#;

impl PostgresSubscriptionRepository {
    async fn find_by(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE {column} = $1");
        sqlx::query_as::<_, Subscription>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn find_by_company(
        &self,
        company_id: Uuid,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let sql =
            format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE company_id = $1");
        sqlx::query_as::<_, Subscription>(&sql)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_by_stripe_subscription(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        self.find_by("stripe_subscription_id", stripe_subscription_id)
            .await
    }

    async fn find_by_asaas_subscription(
        &self,
        asaas_subscription_id: &str,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        self.find_by("asaas_subscription_id", asaas_subscription_id)
            .await
    }

    async fn get_or_create(&self, new_sub: &NewSubscription) -> Result<Subscription, sqlx::Error> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let sql = format!(
            r#"
            INSERT INTO subscriptions (company_id, plan_id, status, provider, value_cents, cycle)
            VALUES ($1, $2, 'PENDING', $3, $4, $5)
            ON CONFLICT (company_id) DO UPDATE SET company_id = EXCLUDED.company_id
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Subscription>(&sql)
            .bind(new_sub.company_id)
            .bind(new_sub.plan_id)
            .bind(new_sub.provider)
            .bind(new_sub.value_cents)
            .bind(new_sub.cycle)
            .fetch_one(&self.pool)
            .await
    }

    async fn save(&self, subscription: &Subscription) -> Result<Subscription, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE subscriptions
            SET plan_id = $2,
                status = $3,
                provider = $4,
                value_cents = $5,
                cycle = $6,
                next_due_date = $7,
                stripe_subscription_id = $8,
                asaas_subscription_id = $9,
                updated_at = now()
            WHERE id = $1
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Subscription>(&sql)
            .bind(subscription.id)
            .bind(subscription.plan_id)
            .bind(subscription.status)
            .bind(subscription.provider)
            .bind(subscription.value_cents)
            .bind(subscription.cycle)
            .bind(subscription.next_due_date)
            .bind(&subscription.stripe_subscription_id)
            .bind(&subscription.asaas_subscription_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn list_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE status = $1 ORDER BY next_due_date NULLS LAST"
        );
        sqlx::query_as::<_, Subscription>(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await
    }

    async fn list_stripe_linked(&self) -> Result<Vec<Subscription>, sqlx::Error> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE stripe_subscription_id IS NOT NULL ORDER BY updated_at"
        );
        sqlx::query_as::<_, Subscription>(&sql)
            .fetch_all(&self.pool)
            .await
    }
}
