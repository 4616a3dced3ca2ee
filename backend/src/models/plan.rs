use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::company::{Entitlements, PlanCode};
use super::subscription::BillingCycle;

/// Catalog entry; the source of truth copied onto a company when it subscribes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: Uuid,
    pub code: PlanCode,
    pub name: String,
    pub price_monthly_cents: i64,
    pub price_yearly_cents: i64,
    pub max_users: i32,
    pub max_executions: i32,
    pub credits: i64,
    pub stripe_price_monthly_id: Option<String>,
    pub stripe_price_yearly_id: Option<String>,
    pub is_active: bool,
}

impl Plan {
    pub fn entitlements(&self) -> Entitlements {
        Entitlements {
            plan: self.code,
            max_users: self.max_users,
            max_executions: self.max_executions,
        }
    }

    pub fn price_cents(&self, cycle: BillingCycle) -> i64 {
        match cycle {
            BillingCycle::Monthly => self.price_monthly_cents,
            BillingCycle::Yearly => self.price_yearly_cents,
        }
    }

    pub fn stripe_price_id(&self, cycle: BillingCycle) -> Option<&str> {
        match cycle {
            BillingCycle::Monthly => self.stripe_price_monthly_id.as_deref(),
            BillingCycle::Yearly => self.stripe_price_yearly_id.as_deref(),
        }
        .filter(|id| !id.trim().is_empty())
    }
}
