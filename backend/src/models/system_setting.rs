use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, FromRow)]
pub struct SystemSetting {
    pub key: String,
    pub value: String,
    pub encrypted: bool,
    pub updated_at: OffsetDateTime,
}
