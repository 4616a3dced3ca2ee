use async_trait::async_trait;
use uuid::Uuid;

use crate::models::subscription::BillingProvider;
use crate::models::webhook_log::{NewWebhookLog, WebhookLog, WebhookLogStatus};

#[derive(Debug, Clone, Default)]
pub struct WebhookLogFilter {
    pub provider: Option<BillingProvider>,
    pub status: Option<WebhookLogStatus>,
    pub limit: i64,
    pub offset: i64,
}

#[async_trait]
pub trait WebhookLogRepository: Send + Sync {
    async fn insert_log(&self, log: &NewWebhookLog) -> Result<Uuid, sqlx::Error>;
    async fn finish_log(
        &self,
        log_id: Uuid,
        status: WebhookLogStatus,
        message: Option<&str>,
    ) -> Result<(), sqlx::Error>;
    async fn list_logs(&self, filter: &WebhookLogFilter) -> Result<Vec<WebhookLog>, sqlx::Error>;
}
