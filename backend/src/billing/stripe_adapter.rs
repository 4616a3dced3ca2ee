//! Translates Stripe webhook events into [`BillingEvent`]s.

use serde_json::{json, Value};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::events::{
    BillingEvent, BillingEventKind, BillingProvider, CompanyRef, PaymentDetails, PlanRef,
    SubscriptionDetails,
};
use crate::models::company::PlanCode;
use crate::models::payment::PaymentStatus;
use crate::models::subscription::{BillingCycle, SubscriptionStatus};
use crate::services::stripe::SubscriptionInfo;

fn jget<'a>(v: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = v;
    for key in path {
        cur = cur.get(*key)?;
    }
    Some(cur)
}

fn jstr(v: &Value, path: &[&str]) -> Option<String> {
    jget(v, path)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

/// Stripe expands some references into objects; accept either form.
fn jref(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(_) => jstr(v, &[key, "id"]),
        _ => None,
    }
}

fn unix_date(v: Option<&Value>) -> Option<Date> {
    let ts = v?.as_i64()?;
    OffsetDateTime::from_unix_timestamp(ts).ok().map(|dt| dt.date())
}

/// Lookup hints carried in `metadata` by our checkout sessions.
struct Hints {
    company_id: Option<Uuid>,
    plan: Option<PlanRef>,
    cycle: Option<BillingCycle>,
}

fn metadata_hints(metadata: Option<&Value>) -> Hints {
    let get = |key: &str| {
        metadata
            .and_then(|m| m.get(key))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    let plan = get("planId")
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .map(PlanRef::Id)
        .or_else(|| get("plan").and_then(PlanCode::parse).map(PlanRef::Code));
    let cycle = get("cycle").and_then(|raw| match raw.to_ascii_uppercase().as_str() {
        "MONTHLY" => Some(BillingCycle::Monthly),
        "YEARLY" => Some(BillingCycle::Yearly),
        _ => None,
    });
    Hints {
        company_id: get("companyId").and_then(|raw| Uuid::parse_str(raw).ok()),
        plan,
        cycle,
    }
}

fn company_refs(
    hints: &Hints,
    customer: Option<&String>,
    subscription: Option<&String>,
) -> Vec<CompanyRef> {
    let mut refs = Vec::new();
    if let Some(id) = hints.company_id {
        refs.push(CompanyRef::Id(id));
    }
    if let Some(customer) = customer {
        refs.push(CompanyRef::StripeCustomer(customer.clone()));
    }
    if let Some(sub) = subscription {
        refs.push(CompanyRef::StripeSubscription(sub.clone()));
    }
    refs
}

fn map_subscription_status(status: &str) -> Option<BillingEventKind> {
    match status {
        "active" | "trialing" => Some(BillingEventKind::SubscriptionActive),
        "past_due" | "unpaid" | "paused" => Some(BillingEventKind::PaymentOverdue),
        "canceled" => Some(BillingEventKind::SubscriptionCanceled),
        "incomplete" => Some(BillingEventKind::SubscriptionPending),
        "incomplete_expired" => Some(BillingEventKind::SubscriptionExpired),
        _ => None,
    }
}

/// Maps a live Stripe subscription status to the local status it implies.
pub fn status_for(stripe_status: &str) -> Option<SubscriptionStatus> {
    match map_subscription_status(stripe_status)? {
        BillingEventKind::SubscriptionPending => Some(SubscriptionStatus::Pending),
        kind => kind.target_status(),
    }
}

fn base_event(event_type: &str, payload: &Value, kind: BillingEventKind) -> BillingEvent {
    BillingEvent {
        provider: BillingProvider::Stripe,
        event_id: jstr(payload, &["id"]).unwrap_or_else(|| event_type.to_string()),
        event_type: event_type.to_string(),
        kind,
        company: Vec::new(),
        customer_id: None,
        plan: None,
        amount_cents: None,
        due_date: None,
        next_due_date: None,
        payment: None,
        subscription: None,
    }
}

fn translate_payment_intent(
    event_type: &str,
    payload: &Value,
    obj: &Value,
    kind: BillingEventKind,
    status: PaymentStatus,
) -> Option<BillingEvent> {
    let id = jstr(obj, &["id"])?;
    let customer = jref(obj, "customer");
    let hints = metadata_hints(obj.get("metadata"));
    let amount = obj
        .get("amount_received")
        .and_then(Value::as_i64)
        .filter(|a| *a > 0)
        .or_else(|| obj.get("amount").and_then(Value::as_i64));

    Some(BillingEvent {
        company: company_refs(&hints, customer.as_ref(), None),
        customer_id: customer,
        plan: hints.plan,
        amount_cents: amount,
        payment: Some(PaymentDetails {
            external_id: id,
            status,
            net_value_cents: None,
            payment_date: matches!(status, PaymentStatus::Received)
                .then(|| unix_date(obj.get("created")))
                .flatten(),
        }),
        ..base_event(event_type, payload, kind)
    })
}

fn translate_invoice(
    event_type: &str,
    payload: &Value,
    obj: &Value,
    kind: BillingEventKind,
    status: PaymentStatus,
) -> Option<BillingEvent> {
    let invoice_id = jstr(obj, &["id"])?;
    let customer = jref(obj, "customer");
    let subscription = jref(obj, "subscription");
    // Newer API versions move subscription metadata under subscription_details.
    let hints = metadata_hints(
        jget(obj, &["subscription_details", "metadata"])
            .filter(|m| m.as_object().is_some_and(|o| !o.is_empty()))
            .or_else(|| obj.get("metadata")),
    );
    let first_line = jget(obj, &["lines", "data"])
        .and_then(Value::as_array)
        .and_then(|lines| lines.first());
    let price = first_line
        .and_then(|line| jstr(line, &["price", "id"]).or_else(|| jstr(line, &["plan", "id"])));
    let period_end = first_line.and_then(|line| unix_date(jget(line, &["period", "end"])));

    let amount = match status {
        PaymentStatus::Received => obj.get("amount_paid"),
        _ => obj.get("amount_due"),
    }
    .and_then(Value::as_i64);

    // Keyed by the payment intent so the paired payment_intent event maps to the same row.
    let external_id = jref(obj, "payment_intent").unwrap_or(invoice_id);

    Some(BillingEvent {
        company: company_refs(&hints, customer.as_ref(), subscription.as_ref()),
        customer_id: customer,
        plan: hints.plan.or(price.map(PlanRef::StripePrice)),
        amount_cents: amount,
        due_date: unix_date(obj.get("due_date")),
        next_due_date: period_end,
        payment: Some(PaymentDetails {
            external_id,
            status,
            net_value_cents: None,
            payment_date: matches!(status, PaymentStatus::Received)
                .then(|| unix_date(jget(obj, &["status_transitions", "paid_at"])))
                .flatten(),
        }),
        subscription: subscription.map(|external_id| SubscriptionDetails {
            external_id,
            cycle: hints.cycle,
            value_cents: None,
        }),
        ..base_event(event_type, payload, kind)
    })
}

fn translate_subscription(
    event_type: &str,
    payload: &Value,
    obj: &Value,
    kind: BillingEventKind,
) -> Option<BillingEvent> {
    let id = jstr(obj, &["id"])?;
    let customer = jref(obj, "customer");
    let hints = metadata_hints(obj.get("metadata"));
    let first_item = jget(obj, &["items", "data"])
        .and_then(Value::as_array)
        .and_then(|items| items.first());
    let price = first_item.and_then(|item| jstr(item, &["price", "id"]));
    let unit_amount = first_item.and_then(|item| {
        jget(item, &["price", "unit_amount"])
            .or_else(|| jget(item, &["plan", "amount"]))
            .and_then(Value::as_i64)
    });
    let cycle = hints.cycle.or_else(|| {
        first_item
            .and_then(|item| jstr(item, &["price", "recurring", "interval"]))
            .map(|interval| match interval.as_str() {
                "year" => BillingCycle::Yearly,
                _ => BillingCycle::Monthly,
            })
    });

    Some(BillingEvent {
        company: company_refs(&hints, customer.as_ref(), Some(&id)),
        customer_id: customer,
        plan: hints.plan.or(price.map(PlanRef::StripePrice)),
        amount_cents: unit_amount,
        next_due_date: unix_date(obj.get("current_period_end")),
        subscription: Some(SubscriptionDetails {
            external_id: id,
            cycle,
            value_cents: unit_amount,
        }),
        ..base_event(event_type, payload, kind)
    })
}

/// `payload` is the full Stripe event (`{id, type, data: {object}}`).
/// Returns `None` for event types that carry no billing meaning.
pub fn translate(event_type: &str, payload: &Value) -> Option<BillingEvent> {
    let obj = jget(payload, &["data", "object"])?;

    match event_type {
        "payment_intent.succeeded" => translate_payment_intent(
            event_type,
            payload,
            obj,
            BillingEventKind::PaymentReceived,
            PaymentStatus::Received,
        ),
        "payment_intent.payment_failed" => translate_payment_intent(
            event_type,
            payload,
            obj,
            BillingEventKind::PaymentOverdue,
            PaymentStatus::Failed,
        ),
        "invoice.payment_succeeded" | "invoice.paid" => translate_invoice(
            event_type,
            payload,
            obj,
            BillingEventKind::PaymentReceived,
            PaymentStatus::Received,
        ),
        "invoice.payment_failed" => translate_invoice(
            event_type,
            payload,
            obj,
            BillingEventKind::PaymentOverdue,
            PaymentStatus::Failed,
        ),
        "customer.subscription.created" | "customer.subscription.updated" => {
            let status = jstr(obj, &["status"])?;
            let kind = map_subscription_status(&status)?;
            translate_subscription(event_type, payload, obj, kind)
        }
        "customer.subscription.deleted" => translate_subscription(
            event_type,
            payload,
            obj,
            BillingEventKind::SubscriptionCanceled,
        ),
        _ => None,
    }
}

/// Builds the event a live subscription lookup implies, so repairs go through
/// the same path as webhooks.
pub fn from_live_subscription(info: &SubscriptionInfo) -> Option<BillingEvent> {
    let mut item = serde_json::Map::new();
    if let Some(price) = &info.price_id {
        item.insert("price".into(), json!({ "id": price }));
    }
    let payload = json!({
        "id": format!("validate:{}:{}", info.id, info.status),
        "type": "customer.subscription.updated",
        "data": { "object": {
            "id": info.id,
            "status": info.status,
            "customer": info.customer,
            "current_period_end": info.current_period_end,
            "metadata": info.metadata,
            "items": { "data": [Value::Object(item)] },
        }}
    });
    translate("customer.subscription.updated", &payload)
}
