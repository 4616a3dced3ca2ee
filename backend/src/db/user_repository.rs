use async_trait::async_trait;
use uuid::Uuid;

use crate::models::user::{User, UserRole};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error>;
    async fn list_company_admins(&self, company_id: Uuid) -> Result<Vec<User>, sqlx::Error>;
    async fn assign_company(
        &self,
        user_id: Uuid,
        company_id: Uuid,
        role: UserRole,
    ) -> Result<(), sqlx::Error>;
}
