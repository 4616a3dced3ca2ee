use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::billing::reconciler::ReconcileOutcome;
use crate::billing::stripe_adapter::{from_live_subscription, status_for};
use crate::db::webhook_log_repository::WebhookLogFilter;
use crate::models::company::PlanCode;
use crate::models::subscription::{BillingProvider, SubscriptionStatus};
use crate::models::webhook_log::WebhookLogStatus;
use crate::responses::JsonResponse;
use crate::routes::auth::{require_super_admin, session::AuthSession};
use crate::routes::billing_error_response;
use crate::services::settings::{SettingsError, SettingsUpdate};
use crate::state::AppState;

macro_rules! super_admin_or_return {
    ($state:expr, $claims:expr) => {
        match require_super_admin(&$state, &$claims).await {
            Ok(user) => user,
            Err(resp) => return resp,
        }
    };
}

// POST /api/admin/subscriptions/check-expired
pub async fn check_expired(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let admin = super_admin_or_return!(app_state, claims);
    match app_state
        .reconciler()
        .check_and_update_expired_subscriptions(
            OffsetDateTime::now_utc(),
            app_state.config.overdue_grace_days,
        )
        .await
    {
        Ok(report) => {
            info!(admin_id = %admin.id, ?report, "manual expiry sweep");
            Json(json!({ "success": true, "report": report })).into_response()
        }
        Err(err) => billing_error_response(err),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationEntry {
    pub company_id: Uuid,
    pub subscription_id: String,
    pub local: SubscriptionStatus,
    pub remote: String,
    pub outcome: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub checked: usize,
    pub mismatched: usize,
    pub repaired: usize,
    pub errors: usize,
    pub details: Vec<ValidationEntry>,
}

// POST /api/admin/subscriptions/validate
pub async fn validate_subscriptions(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    super_admin_or_return!(app_state, claims);

    let settings = match app_state.settings.load().await {
        Ok(s) => s,
        Err(err) => {
            error!(?err, "failed to load settings for validation");
            return JsonResponse::server_error("Failed to load settings").into_response();
        }
    };
    if settings.stripe_secret_key.is_empty() {
        return JsonResponse::server_error("Stripe is not configured").into_response();
    }
    let stripe = app_state.stripe.get(&settings.stripe_secret_key);

    let linked = match app_state.subscriptions.list_stripe_linked().await {
        Ok(rows) => rows,
        Err(err) => {
            error!(?err, "failed to list stripe subscriptions");
            return JsonResponse::server_error("Failed to load subscriptions").into_response();
        }
    };

    let reconciler = app_state.reconciler();
    let mut report = ValidationReport::default();
    for sub in linked {
        let Some(stripe_id) = sub.stripe_subscription_id.clone() else {
            continue;
        };
        report.checked += 1;

        let info = match stripe.retrieve_subscription(&stripe_id).await {
            Ok(info) => info,
            Err(err) => {
                warn!(?err, %stripe_id, "failed to retrieve stripe subscription");
                report.errors += 1;
                continue;
            }
        };
        if status_for(&info.status).is_none_or(|remote| remote == sub.status) {
            continue;
        }
        report.mismatched += 1;

        let outcome = match from_live_subscription(&info) {
            Some(event) => match reconciler.apply(&event).await {
                Ok(outcome) => {
                    if matches!(outcome, ReconcileOutcome::Applied { .. }) {
                        report.repaired += 1;
                    }
                    outcome.summary()
                }
                Err(err) => {
                    error!(?err, %stripe_id, "failed to repair subscription");
                    report.errors += 1;
                    err.to_string()
                }
            },
            None => "no billing meaning".to_string(),
        };
        report.details.push(ValidationEntry {
            company_id: sub.company_id,
            subscription_id: stripe_id,
            local: sub.status,
            remote: info.status,
            outcome,
        });
    }

    info!(
        checked = report.checked,
        mismatched = report.mismatched,
        repaired = report.repaired,
        "stripe subscription validation finished"
    );
    Json(json!({ "success": true, "report": report })).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPlanBody {
    pub plan: String,
    #[serde(default)]
    pub add_credits: i64,
}

// POST /api/admin/companies/{id}/plan
pub async fn set_company_plan(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(company_id): Path<Uuid>,
    Json(body): Json<SetPlanBody>,
) -> Response {
    let admin = super_admin_or_return!(app_state, claims);
    let Some(code) = PlanCode::parse(&body.plan) else {
        return JsonResponse::bad_request("Unknown plan").into_response();
    };
    if body.add_credits < 0 {
        return JsonResponse::bad_request("addCredits must not be negative").into_response();
    }

    match app_state
        .reconciler()
        .admin_set_plan(company_id, code, body.add_credits)
        .await
    {
        Ok(sub) => {
            info!(admin_id = %admin.id, %company_id, plan = code.as_str(), "company plan overridden");
            Json(json!({ "success": true, "subscription": sub })).into_response()
        }
        Err(err) => billing_error_response(err),
    }
}

// POST /api/admin/companies/{id}/cancel
pub async fn cancel_company_subscription(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(company_id): Path<Uuid>,
) -> Response {
    let admin = super_admin_or_return!(app_state, claims);
    match app_state.reconciler().admin_cancel(company_id).await {
        Ok(sub) => {
            info!(admin_id = %admin.id, %company_id, "company subscription canceled by admin");
            Json(json!({ "success": true, "subscription": sub })).into_response()
        }
        Err(err) => billing_error_response(err),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookLogQuery {
    pub provider: Option<BillingProvider>,
    pub status: Option<WebhookLogStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// GET /api/admin/webhook-logs
pub async fn list_webhook_logs(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Query(query): Query<WebhookLogQuery>,
) -> Response {
    super_admin_or_return!(app_state, claims);
    let filter = WebhookLogFilter {
        provider: query.provider,
        status: query.status,
        limit: query.limit.unwrap_or(50).clamp(1, 500),
        offset: query.offset.unwrap_or(0).max(0),
    };
    match app_state.webhook_logs.list_logs(&filter).await {
        Ok(logs) => Json(json!({ "success": true, "logs": logs })).into_response(),
        Err(err) => {
            error!(?err, "failed to list webhook logs");
            JsonResponse::server_error("Failed to load webhook logs").into_response()
        }
    }
}

// GET /api/admin/settings
pub async fn get_settings(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    super_admin_or_return!(app_state, claims);
    match app_state.settings.masked().await {
        Ok(settings) => Json(json!({ "success": true, "settings": settings })).into_response(),
        Err(err) => {
            error!(?err, "failed to load settings");
            JsonResponse::server_error("Failed to load settings").into_response()
        }
    }
}

// PUT /api/admin/settings
pub async fn update_settings(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(update): Json<SettingsUpdate>,
) -> Response {
    let admin = super_admin_or_return!(app_state, claims);
    let rotates_credentials = update.touches_credentials();

    if let Err(err) = app_state.settings.update(update).await {
        return match err {
            SettingsError::Invalid(key) => {
                JsonResponse::bad_request(&format!("Invalid value for {key}")).into_response()
            }
            err => {
                error!(?err, "failed to update settings");
                JsonResponse::server_error("Failed to update settings").into_response()
            }
        };
    }

    if rotates_credentials {
        app_state.stripe.invalidate();
        app_state.asaas.invalidate();
        info!(admin_id = %admin.id, "provider credentials updated; client caches cleared");
    }

    match app_state.settings.masked().await {
        Ok(settings) => Json(json!({ "success": true, "settings": settings })).into_response(),
        Err(err) => {
            error!(?err, "failed to reload settings");
            JsonResponse::server_error("Failed to load settings").into_response()
        }
    }
}
