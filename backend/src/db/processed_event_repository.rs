use async_trait::async_trait;

use crate::models::subscription::BillingProvider;

/// Ledger of billing side effects that already ran, keyed by
/// `"{provider}:{effect}:{subject}"`.
#[async_trait]
pub trait ProcessedEventRepository: Send + Sync {
    /// Records the key; `false` when it was already present.
    async fn try_claim(&self, key: &str, provider: BillingProvider) -> Result<bool, sqlx::Error>;

    /// Forgets a claim whose effect failed so a redelivery can run it again.
    async fn release(&self, key: &str) -> Result<(), sqlx::Error>;
}
