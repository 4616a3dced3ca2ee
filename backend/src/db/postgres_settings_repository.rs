use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::settings_repository::SettingsRepository;
use crate::models::system_setting::SystemSetting;

pub struct PostgresSettingsRepository {
    pub pool: PgPool,
}

#[async_trait]
impl SettingsRepository for PostgresSettingsRepository {
    async fn list_settings(&self) -> Result<Vec<SystemSetting>, sqlx::Error> {
        sqlx::query_as::<_, SystemSetting>(
            "SELECT key, value, encrypted, updated_at FROM system_settings ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn upsert_setting(
        &self,
        key: &str,
        value: &str,
        encrypted: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO system_settings (key, value, encrypted)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, encrypted = EXCLUDED.encrypted, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(encrypted)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
