use async_trait::async_trait;

use crate::models::payment::{Payment, PaymentUpsert};
use crate::models::subscription::BillingProvider;

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn upsert_payment(&self, payment: &PaymentUpsert) -> Result<Payment, sqlx::Error>;
    async fn find_payment(
        &self,
        provider: BillingProvider,
        external_id: &str,
    ) -> Result<Option<Payment>, sqlx::Error>;
}
