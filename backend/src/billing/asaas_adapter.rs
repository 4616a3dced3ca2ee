//! Translates Asaas webhook notifications into [`BillingEvent`]s.
//!
//! Asaas amounts are decimal BRL and dates are `YYYY-MM-DD` strings.

use serde_json::Value;
use time::Date;
use uuid::Uuid;

use super::events::{
    BillingEvent, BillingEventKind, BillingProvider, CompanyRef, PaymentDetails, PlanRef,
    SubscriptionDetails,
};
use crate::models::payment::PaymentStatus;
use crate::models::subscription::BillingCycle;
use crate::services::asaas::decimal_to_cents;
use crate::utils::dates::parse_iso_date;

fn jstr(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn jcents(v: &Value, key: &str) -> Option<i64> {
    v.get(key).and_then(Value::as_f64).map(decimal_to_cents)
}

fn jdate(v: &Value, key: &str) -> Option<Date> {
    v.get(key).and_then(Value::as_str).and_then(parse_iso_date)
}

/// `externalReference` is `"{company_id}"` or `"{company_id}:{plan_id}"`.
pub fn parse_external_reference(raw: &str) -> (Option<Uuid>, Option<Uuid>) {
    let mut parts = raw.splitn(2, ':');
    let company = parts.next().and_then(|p| Uuid::parse_str(p.trim()).ok());
    let plan = parts.next().and_then(|p| Uuid::parse_str(p.trim()).ok());
    (company, plan)
}

pub fn external_reference(company_id: Uuid, plan_id: Uuid) -> String {
    format!("{company_id}:{plan_id}")
}

fn parse_cycle(raw: Option<String>) -> Option<BillingCycle> {
    match raw?.as_str() {
        "MONTHLY" => Some(BillingCycle::Monthly),
        "YEARLY" => Some(BillingCycle::Yearly),
        _ => None,
    }
}

fn payment_kind(event: &str) -> Option<(BillingEventKind, PaymentStatus)> {
    match event {
        "PAYMENT_RECEIVED" | "PAYMENT_CONFIRMED" => {
            Some((BillingEventKind::PaymentReceived, PaymentStatus::Received))
        }
        "PAYMENT_OVERDUE" => Some((BillingEventKind::PaymentOverdue, PaymentStatus::Overdue)),
        "PAYMENT_REFUNDED" => Some((BillingEventKind::PaymentRefunded, PaymentStatus::Refunded)),
        "PAYMENT_DELETED" => Some((BillingEventKind::PaymentDeleted, PaymentStatus::Deleted)),
        _ => None,
    }
}

fn subscription_kind(event: &str, sub: &Value) -> Option<BillingEventKind> {
    match event {
        "SUBSCRIPTION_CREATED" => Some(BillingEventKind::SubscriptionPending),
        "SUBSCRIPTION_UPDATED" => match jstr(sub, "status")?.as_str() {
            "ACTIVE" => Some(BillingEventKind::SubscriptionActive),
            "EXPIRED" => Some(BillingEventKind::SubscriptionExpired),
            "INACTIVE" => Some(BillingEventKind::SubscriptionCanceled),
            _ => None,
        },
        "SUBSCRIPTION_DELETED" | "SUBSCRIPTION_INACTIVATED" => {
            Some(BillingEventKind::SubscriptionCanceled)
        }
        _ => None,
    }
}

/// Delivery identity: the payload `id` when present, else `"{event}:{object id}"`.
pub fn event_id(payload: &Value) -> Option<String> {
    if let Some(id) = jstr(payload, "id") {
        return Some(id);
    }
    let event = jstr(payload, "event")?;
    let object_id = payload
        .get("payment")
        .and_then(|p| jstr(p, "id"))
        .or_else(|| payload.get("subscription").and_then(|s| jstr(s, "id")))?;
    Some(format!("{event}:{object_id}"))
}

fn company_refs(obj: &Value, subscription: Option<&str>) -> (Vec<CompanyRef>, Option<Uuid>) {
    let mut refs = Vec::new();
    let (company_id, plan_id) = jstr(obj, "externalReference")
        .map(|r| parse_external_reference(&r))
        .unwrap_or((None, None));
    if let Some(id) = company_id {
        refs.push(CompanyRef::Id(id));
    }
    if let Some(customer) = jstr(obj, "customer") {
        refs.push(CompanyRef::AsaasCustomer(customer));
    }
    if let Some(sub) = subscription {
        refs.push(CompanyRef::AsaasSubscription(sub.to_string()));
    }
    (refs, plan_id)
}

/// Returns `None` for events without billing meaning or without the object they describe.
pub fn translate(payload: &Value) -> Option<BillingEvent> {
    let event_type = jstr(payload, "event")?;
    let event_id = event_id(payload)?;

    if let Some((kind, status)) = payment_kind(&event_type) {
        let payment = payload.get("payment")?;
        let external_id = jstr(payment, "id")?;
        let subscription = jstr(payment, "subscription");
        let (company, plan_id) = company_refs(payment, subscription.as_deref());

        return Some(BillingEvent {
            provider: BillingProvider::Asaas,
            event_id,
            event_type,
            kind,
            company,
            customer_id: jstr(payment, "customer"),
            plan: plan_id.map(PlanRef::Id),
            amount_cents: jcents(payment, "value"),
            due_date: jdate(payment, "dueDate"),
            next_due_date: None,
            payment: Some(PaymentDetails {
                external_id,
                status,
                net_value_cents: jcents(payment, "netValue"),
                payment_date: jdate(payment, "paymentDate")
                    .or_else(|| jdate(payment, "clientPaymentDate"))
                    .or_else(|| jdate(payment, "confirmedDate")),
            }),
            subscription: subscription.map(|external_id| SubscriptionDetails {
                external_id,
                cycle: None,
                value_cents: None,
            }),
        });
    }

    let sub = payload.get("subscription")?;
    let kind = subscription_kind(&event_type, sub)?;
    let external_id = jstr(sub, "id")?;
    let (company, plan_id) = company_refs(sub, Some(&external_id));
    let value_cents = jcents(sub, "value");

    Some(BillingEvent {
        provider: BillingProvider::Asaas,
        event_id,
        event_type,
        kind,
        company,
        customer_id: jstr(sub, "customer"),
        plan: plan_id.map(PlanRef::Id),
        amount_cents: value_cents,
        due_date: None,
        next_due_date: jdate(sub, "nextDueDate"),
        payment: None,
        subscription: Some(SubscriptionDetails {
            external_id,
            cycle: parse_cycle(jstr(sub, "cycle")),
            value_cents,
        }),
    })
}
