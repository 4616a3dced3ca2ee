use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::payment_repository::PaymentRepository;
use crate::models::payment::{Payment, PaymentUpsert};
use crate::models::subscription::BillingProvider;

pub struct PostgresPaymentRepository {
    pub pool: PgPool,
}

const PAYMENT_COLUMNS: &str = r#"
    id, company_id, subscription_id, provider, external_id, value_cents, net_value_cents,
    status, due_date, payment_date, created_at, updated_at
"#;

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn upsert_payment(&self, payment: &PaymentUpsert) -> Result<Payment, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO payments
                (company_id, subscription_id, provider, external_id, value_cents,
                 net_value_cents, status, due_date, payment_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (provider, external_id) DO UPDATE
            SET subscription_id = COALESCE(EXCLUDED.subscription_id, payments.subscription_id),
                value_cents = EXCLUDED.value_cents,
                net_value_cents = COALESCE(EXCLUDED.net_value_cents, payments.net_value_cents),
                status = EXCLUDED.status,
                due_date = COALESCE(EXCLUDED.due_date, payments.due_date),
                payment_date = COALESCE(EXCLUDED.payment_date, payments.payment_date),
                updated_at = now()
            RETURNING {PAYMENT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Payment>(&sql)
            .bind(payment.company_id)
            .bind(payment.subscription_id)
            .bind(payment.provider)
            .bind(&payment.external_id)
            .bind(payment.value_cents)
            .bind(payment.net_value_cents)
            .bind(payment.status)
            .bind(payment.due_date)
            .bind(payment.payment_date)
            .fetch_one(&self.pool)
            .await
    }

    async fn find_payment(
        &self,
        provider: BillingProvider,
        external_id: &str,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE provider = $1 AND external_id = $2"
        );
        sqlx::query_as::<_, Payment>(&sql)
            .bind(provider)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
    }
}
