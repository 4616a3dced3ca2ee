use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::execution_repository::ExecutionRepository;
use crate::models::execution::{Execution, NewExecution};

pub struct PostgresExecutionRepository {
    pub pool: PgPool,
}

#[async_trait]
impl ExecutionRepository for PostgresExecutionRepository {
    async fn count_since(
        &self,
        company_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM executions WHERE company_id = $1 AND created_at >= $2",
        )
        .bind(company_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
    }

    async fn record_execution(&self, execution: &NewExecution) -> Result<Execution, sqlx::Error> {
        sqlx::query_as::<_, Execution>(
            r#"
            INSERT INTO executions (company_id, user_id, agent, credits_used)
            VALUES ($1, $2, $3, $4)
            RETURNING id, company_id, user_id, agent, credits_used, created_at
            "#,
        )
        .bind(execution.company_id)
        .bind(execution.user_id)
        .bind(&execution.agent)
        .bind(execution.credits_used)
        .fetch_one(&self.pool)
        .await
    }
}
