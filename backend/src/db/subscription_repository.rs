use async_trait::async_trait;
use uuid::Uuid;

use crate::models::subscription::{NewSubscription, Subscription, SubscriptionStatus};

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_by_company(&self, company_id: Uuid)
        -> Result<Option<Subscription>, sqlx::Error>;
    async fn find_by_stripe_subscription(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>, sqlx::Error>;
    async fn find_by_asaas_subscription(
        &self,
        asaas_subscription_id: &str,
    ) -> Result<Option<Subscription>, sqlx::Error>;
    /// Returns the company's subscription, inserting a PENDING row when none exists.
    async fn get_or_create(&self, new_sub: &NewSubscription) -> Result<Subscription, sqlx::Error>;
    async fn save(&self, subscription: &Subscription) -> Result<Subscription, sqlx::Error>;
    async fn list_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<Vec<Subscription>, sqlx::Error>;
    async fn list_stripe_linked(&self) -> Result<Vec<Subscription>, sqlx::Error>;
}
