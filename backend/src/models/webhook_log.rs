use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use time::OffsetDateTime;
use uuid::Uuid;

use super::subscription::BillingProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "webhook_log_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookLogStatus {
    Processing,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WebhookLog {
    pub id: Uuid,
    pub provider: BillingProvider,
    pub event_type: String,
    pub event_id: Option<String>,
    pub payload: serde_json::Value,
    pub status: WebhookLogStatus,
    pub message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub processed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewWebhookLog {
    pub provider: BillingProvider,
    pub event_type: String,
    pub event_id: Option<String>,
    pub payload: serde_json::Value,
}
