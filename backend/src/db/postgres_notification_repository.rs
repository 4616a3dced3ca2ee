use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::notification_repository::NotificationRepository;
use crate::models::notification::{NewNotification, Notification};

pub struct PostgresNotificationRepository {
    pub pool: PgPool,
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, company_id, kind, title, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, company_id, kind, title, message, read, created_at
            "#,
        )
        .bind(notification.user_id)
        .bind(notification.company_id)
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, company_id, kind, title, message, read, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE notifications SET read = true WHERE id = $1 AND user_id = $2")
                .bind(notification_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE notifications SET read = true WHERE user_id = $1 AND NOT read")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
