use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::processed_event_repository::ProcessedEventRepository;
use crate::models::subscription::BillingProvider;

pub struct PostgresProcessedEventRepository {
    pub pool: PgPool,
}

#[async_trait]
impl ProcessedEventRepository for PostgresProcessedEventRepository {
    async fn try_claim(&self, key: &str, provider: BillingProvider) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (idempotency_key, provider)
            VALUES ($1, $2)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(provider)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, key: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM processed_events WHERE idempotency_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
