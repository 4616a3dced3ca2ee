//! Subscription reconciliation: provider webhooks in, company entitlements out.

pub mod access;
pub mod asaas_adapter;
pub mod events;
pub mod expiry;
pub mod ingest;
pub mod reconciler;
pub mod state_machine;
pub mod stripe_adapter;

use uuid::Uuid;

use crate::services::settings::SettingsError;
use state_machine::TransitionError;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("company {0} not found")]
    CompanyNotFound(Uuid),
    #[error("plan {0} not found")]
    PlanNotFound(String),
    #[error("no subscription for company {0}")]
    SubscriptionNotFound(Uuid),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("company already has a live subscription")]
    AlreadySubscribed,
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
