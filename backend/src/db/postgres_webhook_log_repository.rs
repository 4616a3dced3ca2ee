use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::webhook_log_repository::{WebhookLogFilter, WebhookLogRepository};
use crate::models::webhook_log::{NewWebhookLog, WebhookLog, WebhookLogStatus};

pub struct PostgresWebhookLogRepository {
    pub pool: PgPool,
}

#[async_trait]
impl WebhookLogRepository for PostgresWebhookLogRepository {
    async fn insert_log(&self, log: &NewWebhookLog) -> Result<Uuid, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO webhook_logs (provider, event_type, event_id, payload, status)
            VALUES ($1, $2, $3, $4, 'PROCESSING')
            RETURNING id
            "#,
        )
        .bind(log.provider)
        .bind(&log.event_type)
        .bind(&log.event_id)
        .bind(&log.payload)
        .fetch_one(&self.pool)
        .await
    }

    async fn finish_log(
        &self,
        log_id: Uuid,
        status: WebhookLogStatus,
        message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE webhook_logs SET status = $2, message = $3, processed_at = now() WHERE id = $1",
        )
        .bind(log_id)
        .bind(status)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_logs(&self, filter: &WebhookLogFilter) -> Result<Vec<WebhookLog>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT id, provider, event_type, event_id, payload, status, message, created_at, processed_at FROM webhook_logs WHERE 1=1",
        );

        if let Some(provider) = filter.provider {
            builder.push(" AND provider = ").push_bind(provider);
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status);
        }

        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        builder
            .build_query_as::<WebhookLog>()
            .fetch_all(&self.pool)
            .await
    }
}
