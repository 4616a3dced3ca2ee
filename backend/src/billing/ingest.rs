//! Shared webhook pipeline: audit log, translate, reconcile, close the log.

use serde_json::Value;
use tracing::{error, info};

use super::events::{BillingEvent, BillingProvider};
use super::reconciler::{EntitlementReconciler, ReconcileOutcome};
use super::{asaas_adapter, stripe_adapter, BillingError};
use crate::db::webhook_log_repository::WebhookLogRepository;
use crate::models::webhook_log::{NewWebhookLog, WebhookLogStatus};

/// An authenticated webhook body, already parsed as JSON.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    pub provider: BillingProvider,
    pub event_type: String,
    pub event_id: Option<String>,
    pub payload: Value,
}

impl WebhookDelivery {
    pub fn stripe(payload: Value) -> Self {
        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let event_id = payload
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            provider: BillingProvider::Stripe,
            event_type,
            event_id,
            payload,
        }
    }

    pub fn asaas(payload: Value) -> Self {
        let event_type = payload
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        Self {
            provider: BillingProvider::Asaas,
            event_type,
            event_id: asaas_adapter::event_id(&payload),
            payload,
        }
    }

    fn translate(&self) -> Option<BillingEvent> {
        match self.provider {
            BillingProvider::Stripe => stripe_adapter::translate(&self.event_type, &self.payload),
            BillingProvider::Asaas => asaas_adapter::translate(&self.payload),
        }
    }
}

/// Runs one delivery end to end. The webhook log row is always closed, with
/// SUCCESS for applied and ignored events and ERROR when reconciliation fails.
pub async fn ingest(
    logs: &dyn WebhookLogRepository,
    reconciler: &EntitlementReconciler,
    delivery: WebhookDelivery,
) -> Result<ReconcileOutcome, BillingError> {
    let log_id = logs
        .insert_log(&NewWebhookLog {
            provider: delivery.provider,
            event_type: delivery.event_type.clone(),
            event_id: delivery.event_id.clone(),
            payload: delivery.payload.clone(),
        })
        .await?;

    let Some(event) = delivery.translate() else {
        info!(
            provider = delivery.provider.as_str(),
            event_type = %delivery.event_type,
            "webhook event has no billing effect"
        );
        logs.finish_log(log_id, WebhookLogStatus::Success, Some("ignored"))
            .await?;
        return Ok(ReconcileOutcome::Ignored {
            reason: format!("unhandled event type {}", delivery.event_type),
        });
    };

    match reconciler.apply(&event).await {
        Ok(outcome) => {
            logs.finish_log(log_id, WebhookLogStatus::Success, Some(&outcome.summary()))
                .await?;
            Ok(outcome)
        }
        Err(err) => {
            error!(
                provider = delivery.provider.as_str(),
                event_id = %event.event_id,
                ?err,
                "failed to reconcile webhook event"
            );
            if let Err(log_err) = logs
                .finish_log(log_id, WebhookLogStatus::Error, Some(&err.to_string()))
                .await
            {
                error!(?log_err, "failed to close webhook log");
            }
            Err(err)
        }
    }
}
