use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::user_repository::UserRepository;
use crate::models::user::{User, UserRole};

pub struct PostgresUserRepository {
    pub pool: PgPool,
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, name, company_id, role, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_company_admins(&self, company_id: Uuid) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, company_id, role, created_at
            FROM users
            WHERE company_id = $1 AND role = 'ADMIN'
            ORDER BY created_at
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn assign_company(
        &self,
        user_id: Uuid,
        company_id: Uuid,
        role: UserRole,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET company_id = $2, role = $3 WHERE id = $1")
            .bind(user_id)
            .bind(company_id)
            .bind(role)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
