use async_trait::async_trait;
use uuid::Uuid;

use crate::models::notification::{NewNotification, Notification};

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, sqlx::Error>;
    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error>;
    /// `false` when the notification does not belong to the user.
    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool, sqlx::Error>;
    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, sqlx::Error>;
}
