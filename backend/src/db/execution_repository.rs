use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::execution::{Execution, NewExecution};

#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    async fn count_since(&self, company_id: Uuid, since: OffsetDateTime)
        -> Result<i64, sqlx::Error>;
    async fn record_execution(&self, execution: &NewExecution) -> Result<Execution, sqlx::Error>;
}
