use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::models::subscription::BillingCycle;

#[derive(Debug, thiserror::Error)]
pub enum AsaasServiceError {
    #[error("Asaas request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Asaas API responded with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Asaas API returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("config error: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AsaasBillingType {
    Boleto,
    CreditCard,
    Pix,
    #[default]
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsaasCustomer {
    pub name: String,
    pub email: Option<String>,
    pub cpf_cnpj: Option<String>,
    /// Company id, echoed back on webhooks as `externalReference`.
    pub external_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsaasSubscription {
    pub customer: String,
    pub billing_type: AsaasBillingType,
    pub value_cents: i64,
    pub next_due_date: Date,
    pub cycle: BillingCycle,
    pub description: String,
    pub external_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasSubscription {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub next_due_date: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
}

#[async_trait]
pub trait AsaasService: Send + Sync {
    async fn create_customer(&self, customer: &NewAsaasCustomer)
        -> Result<String, AsaasServiceError>;

    async fn create_subscription(
        &self,
        subscription: &NewAsaasSubscription,
    ) -> Result<AsaasSubscription, AsaasServiceError>;

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<AsaasSubscription, AsaasServiceError>;
}

/// Converts integer cents into the decimal BRL value the Asaas API expects.
pub fn cents_to_decimal(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Converts a decimal BRL value from an Asaas payload into cents.
pub fn decimal_to_cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

mod live;
#[cfg(test)]
mod mock;

pub use live::LiveAsaasService;
#[cfg(test)]
pub use mock::MockAsaasService;
