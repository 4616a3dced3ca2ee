use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::company_repository::CompanyRepository;
use crate::models::company::{Company, Entitlements, NewCompany};

pub struct PostgresCompanyRepository {
    pub pool: PgPool,
}

const COMPANY_COLUMNS: &str = r#"
    id, name, plan, credits, max_users, max_executions, is_trialing,
    trial_start_date, trial_end_date, stripe_customer_id, asaas_customer_id,
    created_at, updated_at
"#;

impl PostgresCompanyRepository {
    async fn find_by(&self, column: &str, value: &str) -> Result<Option<Company>, sqlx::Error> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE {column} = $1");
        sqlx::query_as::<_, Company>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
    }
}

#[async_trait]
impl CompanyRepository for PostgresCompanyRepository {
    async fn find_company(&self, company_id: Uuid) -> Result<Option<Company>, sqlx::Error> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1");
        sqlx::query_as::<_, Company>(&sql)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_company_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Company>, sqlx::Error> {
        self.find_by("stripe_customer_id", customer_id).await
    }

    async fn find_company_by_asaas_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Company>, sqlx::Error> {
        self.find_by("asaas_customer_id", customer_id).await
    }

    async fn create_company(&self, new_company: &NewCompany) -> Result<Company, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO companies
                (name, plan, credits, max_users, max_executions, is_trialing,
                 trial_start_date, trial_end_date)
            VALUES ($1, $2, $3, $4, $5, true, $6, $7)
            RETURNING {COMPANY_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Company>(&sql)
            .bind(&new_company.name)
            .bind(new_company.entitlements.plan)
            .bind(new_company.credits)
            .bind(new_company.entitlements.max_users)
            .bind(new_company.entitlements.max_executions)
            .bind(new_company.trial_start_date)
            .bind(new_company.trial_end_date)
            .fetch_one(&self.pool)
            .await
    }

    async fn set_stripe_customer_id(
        &self,
        company_id: Uuid,
        customer_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE companies SET stripe_customer_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(company_id)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_asaas_customer_id(
        &self,
        company_id: Uuid,
        customer_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE companies SET asaas_customer_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(company_id)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn apply_entitlements(
        &self,
        company_id: Uuid,
        entitlements: Entitlements,
        end_trial: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE companies
            SET plan = $2,
                max_users = $3,
                max_executions = $4,
                is_trialing = CASE WHEN $5 THEN false ELSE is_trialing END,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(company_id)
        .bind(entitlements.plan)
        .bind(entitlements.max_users)
        .bind(entitlements.max_executions)
        .bind(end_trial)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_credits(&self, company_id: Uuid, amount: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE companies
            SET credits = credits + $2, updated_at = now()
            WHERE id = $1
            RETURNING credits
            "#,
        )
        .bind(company_id)
        .bind(amount)
        .fetch_one(&self.pool)
        .await
    }

    async fn try_consume_credits(
        &self,
        company_id: Uuid,
        cost: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE companies
            SET credits = credits - $2, updated_at = now()
            WHERE id = $1 AND credits >= $2
            RETURNING credits
            "#,
        )
        .bind(company_id)
        .bind(cost)
        .fetch_optional(&self.pool)
        .await
    }
}
