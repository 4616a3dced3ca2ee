use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::plan_repository::PlanRepository;
use crate::models::company::PlanCode;
use crate::models::plan::Plan;

pub struct PostgresPlanRepository {
    pub pool: PgPool,
}

const PLAN_COLUMNS: &str = r#"
    id, code, name, price_monthly_cents, price_yearly_cents, max_users, max_executions,
    credits, stripe_price_monthly_id, stripe_price_yearly_id, is_active
"#;

#[async_trait]
impl PlanRepository for PostgresPlanRepository {
    async fn list_active_plans(&self) -> Result<Vec<Plan>, sqlx::Error> {
        let sql = format!(
            "SELECT {PLAN_COLUMNS} FROM plans WHERE is_active ORDER BY code"
        );
        sqlx::query_as::<_, Plan>(&sql).fetch_all(&self.pool).await
    }

    async fn find_plan_by_id(&self, plan_id: Uuid) -> Result<Option<Plan>, sqlx::Error> {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = $1");
        sqlx::query_as::<_, Plan>(&sql)
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_plan_by_code(&self, code: PlanCode) -> Result<Option<Plan>, sqlx::Error> {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM plans WHERE code = $1");
        sqlx::query_as::<_, Plan>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_plan_by_stripe_price(
        &self,
        price_id: &str,
    ) -> Result<Option<Plan>, sqlx::Error> {
        let sql = format!(
            "SELECT {PLAN_COLUMNS} FROM plans WHERE stripe_price_monthly_id = $1 OR stripe_price_yearly_id = $1 LIMIT 1"
        );
        sqlx::query_as::<_, Plan>(&sql)
            .bind(price_id)
            .fetch_optional(&self.pool)
            .await
    }
}
