use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::subscription::BillingProvider;
use crate::utils::dates::iso_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Received,
    Overdue,
    Refunded,
    Deleted,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub company_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub provider: BillingProvider,
    pub external_id: String,
    pub value_cents: i64,
    pub net_value_cents: Option<i64>,
    pub status: PaymentStatus,
    #[serde(with = "iso_date::option")]
    pub due_date: Option<Date>,
    #[serde(with = "iso_date::option")]
    pub payment_date: Option<Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Insert-or-update keyed by `(provider, external_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUpsert {
    pub company_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub provider: BillingProvider,
    pub external_id: String,
    pub value_cents: i64,
    pub net_value_cents: Option<i64>,
    pub status: PaymentStatus,
    pub due_date: Option<Date>,
    pub payment_date: Option<Date>,
}
