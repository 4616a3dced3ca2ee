use async_trait::async_trait;
use uuid::Uuid;

use crate::models::company::{Company, Entitlements, NewCompany};

#[async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn find_company(&self, company_id: Uuid) -> Result<Option<Company>, sqlx::Error>;
    async fn find_company_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Company>, sqlx::Error>;
    async fn find_company_by_asaas_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Company>, sqlx::Error>;
    async fn create_company(&self, new_company: &NewCompany) -> Result<Company, sqlx::Error>;
    async fn set_stripe_customer_id(
        &self,
        company_id: Uuid,
        customer_id: &str,
    ) -> Result<(), sqlx::Error>;
    async fn set_asaas_customer_id(
        &self,
        company_id: Uuid,
        customer_id: &str,
    ) -> Result<(), sqlx::Error>;
    /// Copies plan limits onto the company; `end_trial` also clears the trial flag.
    async fn apply_entitlements(
        &self,
        company_id: Uuid,
        entitlements: Entitlements,
        end_trial: bool,
    ) -> Result<(), sqlx::Error>;
    /// Returns the new balance.
    async fn add_credits(&self, company_id: Uuid, amount: i64) -> Result<i64, sqlx::Error>;
    /// Decrements only when `credits >= cost`; `None` means the balance was insufficient.
    async fn try_consume_credits(
        &self,
        company_id: Uuid,
        cost: i64,
    ) -> Result<Option<i64>, sqlx::Error>;
}
