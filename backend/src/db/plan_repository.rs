use async_trait::async_trait;
use uuid::Uuid;

use crate::models::company::PlanCode;
use crate::models::plan::Plan;

#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn list_active_plans(&self) -> Result<Vec<Plan>, sqlx::Error>;
    async fn find_plan_by_id(&self, plan_id: Uuid) -> Result<Option<Plan>, sqlx::Error>;
    async fn find_plan_by_code(&self, code: PlanCode) -> Result<Option<Plan>, sqlx::Error>;
    /// Matches either the monthly or the yearly Stripe price.
    async fn find_plan_by_stripe_price(&self, price_id: &str)
        -> Result<Option<Plan>, sqlx::Error>;
}
