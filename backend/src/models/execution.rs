use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: Uuid,
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub agent: String,
    pub credits_used: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewExecution {
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub agent: String,
    pub credits_used: i64,
}
