//! Provider-neutral billing events.
//!
//! Both webhook translators produce a [`BillingEvent`]; the reconciler only
//! ever sees this shape.

use std::fmt;

use time::Date;
use uuid::Uuid;

use crate::models::company::PlanCode;
use crate::models::payment::PaymentStatus;
pub use crate::models::subscription::BillingProvider;
use crate::models::subscription::{BillingCycle, SubscriptionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingEventKind {
    PaymentReceived,
    PaymentOverdue,
    PaymentRefunded,
    PaymentDeleted,
    /// Provider acknowledged a new subscription; links ids without changing status.
    SubscriptionPending,
    SubscriptionActive,
    SubscriptionCanceled,
    SubscriptionExpired,
}

impl BillingEventKind {
    /// Status the subscription should move to, `None` for record-only events.
    pub fn target_status(&self) -> Option<SubscriptionStatus> {
        match self {
            BillingEventKind::PaymentReceived | BillingEventKind::SubscriptionActive => {
                Some(SubscriptionStatus::Active)
            }
            BillingEventKind::PaymentOverdue => Some(SubscriptionStatus::Overdue),
            BillingEventKind::SubscriptionCanceled => Some(SubscriptionStatus::Canceled),
            BillingEventKind::SubscriptionExpired => Some(SubscriptionStatus::Expired),
            BillingEventKind::PaymentRefunded
            | BillingEventKind::PaymentDeleted
            | BillingEventKind::SubscriptionPending => None,
        }
    }
}

impl fmt::Display for BillingEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BillingEventKind::PaymentReceived => "payment_received",
            BillingEventKind::PaymentOverdue => "payment_overdue",
            BillingEventKind::PaymentRefunded => "payment_refunded",
            BillingEventKind::PaymentDeleted => "payment_deleted",
            BillingEventKind::SubscriptionPending => "subscription_pending",
            BillingEventKind::SubscriptionActive => "subscription_active",
            BillingEventKind::SubscriptionCanceled => "subscription_canceled",
            BillingEventKind::SubscriptionExpired => "subscription_expired",
        };
        f.write_str(name)
    }
}

/// Lookup keys for the owning company, tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyRef {
    Id(Uuid),
    StripeCustomer(String),
    AsaasCustomer(String),
    StripeSubscription(String),
    AsaasSubscription(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanRef {
    Id(Uuid),
    Code(PlanCode),
    StripePrice(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    pub external_id: String,
    pub status: PaymentStatus,
    pub net_value_cents: Option<i64>,
    pub payment_date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionDetails {
    pub external_id: String,
    pub cycle: Option<BillingCycle>,
    pub value_cents: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingEvent {
    pub provider: BillingProvider,
    pub event_id: String,
    pub event_type: String,
    pub kind: BillingEventKind,
    pub company: Vec<CompanyRef>,
    pub customer_id: Option<String>,
    pub plan: Option<PlanRef>,
    pub amount_cents: Option<i64>,
    pub due_date: Option<Date>,
    pub next_due_date: Option<Date>,
    pub payment: Option<PaymentDetails>,
    pub subscription: Option<SubscriptionDetails>,
}

impl BillingEvent {
    /// Identity used for at-most-once side effects. Redeliveries of the same
    /// payment, and sibling events about one payment, share a subject.
    pub fn idempotency_subject(&self) -> String {
        if let Some(payment) = &self.payment {
            return payment.external_id.clone();
        }
        if let Some(sub) = &self.subscription {
            return match self.next_due_date {
                Some(due) => format!("{}@{}", sub.external_id, due),
                None => sub.external_id.clone(),
            };
        }
        self.event_id.clone()
    }

    /// Ledger key for one effect of this event.
    pub fn ledger_key(&self, effect: &str) -> String {
        format!(
            "{}:{}:{}",
            self.provider.as_str(),
            effect,
            self.idempotency_subject()
        )
    }
}
