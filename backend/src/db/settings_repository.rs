use async_trait::async_trait;

use crate::models::system_setting::SystemSetting;

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn list_settings(&self) -> Result<Vec<SystemSetting>, sqlx::Error>;
    async fn upsert_setting(
        &self,
        key: &str,
        value: &str,
        encrypted: bool,
    ) -> Result<(), sqlx::Error>;
}
