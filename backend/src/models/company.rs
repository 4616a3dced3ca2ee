use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use time::OffsetDateTime;
use uuid::Uuid;

/// Limit value meaning "no cap" for users or executions.
pub const UNLIMITED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "plan_code", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanCode {
    Starter,
    Professional,
    Business,
    Enterprise,
}

impl PlanCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanCode::Starter => "STARTER",
            PlanCode::Professional => "PROFESSIONAL",
            PlanCode::Business => "BUSINESS",
            PlanCode::Enterprise => "ENTERPRISE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "STARTER" => Some(PlanCode::Starter),
            "PROFESSIONAL" => Some(PlanCode::Professional),
            "BUSINESS" => Some(PlanCode::Business),
            "ENTERPRISE" => Some(PlanCode::Enterprise),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub plan: PlanCode,
    pub credits: i64,
    pub max_users: i32,
    pub max_executions: i32,
    pub is_trialing: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub trial_start_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub trial_end_date: Option<OffsetDateTime>,
    pub stripe_customer_id: Option<String>,
    pub asaas_customer_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Company {
    pub fn trial_expired(&self, now: OffsetDateTime) -> bool {
        self.is_trialing && self.trial_end_date.is_some_and(|end| end < now)
    }
}

/// Plan-derived limits copied onto a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entitlements {
    pub plan: PlanCode,
    pub max_users: i32,
    pub max_executions: i32,
}

impl Entitlements {
    /// Used when the STARTER row is missing from the catalog.
    pub const STARTER_FALLBACK: Entitlements = Entitlements {
        plan: PlanCode::Starter,
        max_users: 3,
        max_executions: 100,
    };
}

#[derive(Debug, Clone)]
pub struct NewCompany {
    pub name: String,
    pub entitlements: Entitlements,
    pub credits: i64,
    pub trial_start_date: OffsetDateTime,
    pub trial_end_date: OffsetDateTime,
}
