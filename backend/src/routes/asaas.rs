use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use time::{Date, OffsetDateTime};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::billing::asaas_adapter::external_reference;
use crate::billing::events::BillingProvider;
use crate::billing::ingest::{ingest, WebhookDelivery};
use crate::models::subscription::{BillingCycle, SubscriptionStatus};
use crate::responses::JsonResponse;
use crate::routes::auth::{require_company_admin, session::AuthSession};
use crate::routes::{billing_error_response, plans::resolve_selected_plan};
use crate::services::asaas::{AsaasBillingType, NewAsaasCustomer, NewAsaasSubscription};
use crate::state::AppState;
use crate::utils::dates::iso_date;
use crate::utils::signature::verify_shared_token;

pub const ASAAS_TOKEN_HEADER: &str = "asaas-access-token";

// POST /api/asaas/webhook
pub async fn webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    let settings = match app_state.settings.load().await {
        Ok(s) => s,
        Err(err) => {
            error!(?err, "failed to load billing settings for asaas webhook");
            return JsonResponse::server_error("Failed to load settings").into_response();
        }
    };

    let provided = headers
        .get(ASAAS_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok());
    match settings.asaas_webhook_token.as_deref() {
        Some(expected) => {
            if let Err(err) = verify_shared_token(provided, expected) {
                warn!(?err, "asaas webhook token rejected");
                return JsonResponse::unauthorized("Invalid webhook token").into_response();
            }
        }
        None if settings.require_asaas_webhook_token => {
            error!("asaas webhook token is required but not configured");
            return JsonResponse::unauthorized("Invalid webhook token").into_response();
        }
        None => warn!("accepting asaas webhook without a configured access token"),
    }

    let reconciler = app_state.reconciler();
    match ingest(
        app_state.webhook_logs.as_ref(),
        &reconciler,
        WebhookDelivery::asaas(payload),
    )
    .await
    {
        Ok(_) => Json(json!({ "received": true })).into_response(),
        Err(_) => JsonResponse::server_error("Failed to process webhook").into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionBody {
    pub plan_id: Option<Uuid>,
    pub plan_code: Option<String>,
    #[serde(default)]
    pub cycle: BillingCycle,
    #[serde(default)]
    pub billing_type: AsaasBillingType,
    pub cpf_cnpj: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub next_due_date: Option<Date>,
}

// POST /api/asaas/subscriptions
pub async fn create_subscription(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(body): Json<CreateSubscriptionBody>,
) -> Response {
    let member = match require_company_admin(&app_state, &claims).await {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    let company_id = member.company_id;

    let plan =
        match resolve_selected_plan(&app_state, body.plan_id, body.plan_code.as_deref()).await {
            Ok(p) => p,
            Err(resp) => return resp,
        };
    let value_cents = plan.price_cents(body.cycle);
    if value_cents <= 0 {
        return JsonResponse::bad_request("Plan is not available for self-service billing")
            .into_response();
    }

    let company = match app_state.companies.find_company(company_id).await {
        Ok(Some(c)) => c,
        Ok(None) => return JsonResponse::not_found("Company not found").into_response(),
        Err(err) => {
            error!(?err, %company_id, "failed to load company for asaas subscription");
            return JsonResponse::server_error("Failed to create subscription").into_response();
        }
    };

    match app_state.subscriptions.find_by_company(company_id).await {
        Ok(Some(sub))
            if matches!(
                sub.status,
                SubscriptionStatus::Active | SubscriptionStatus::Overdue
            ) =>
        {
            return JsonResponse::conflict("Company already has an active subscription")
                .into_response();
        }
        Ok(_) => {}
        Err(err) => {
            error!(?err, %company_id, "failed to load subscription");
            return JsonResponse::server_error("Failed to create subscription").into_response();
        }
    }

    let settings = match app_state.settings.load().await {
        Ok(s) => s,
        Err(err) => {
            error!(?err, "failed to load billing settings for asaas subscription");
            return JsonResponse::server_error("Failed to create subscription").into_response();
        }
    };
    if settings.asaas_api_key.is_empty() {
        return JsonResponse::server_error("Asaas is not configured").into_response();
    }
    let asaas = app_state.asaas.get(&settings.asaas_api_key);

    let customer = match company.asaas_customer_id.clone() {
        Some(existing) => existing,
        None => {
            let created = match asaas
                .create_customer(&NewAsaasCustomer {
                    name: company.name.clone(),
                    email: Some(member.user.email.clone()),
                    cpf_cnpj: body.cpf_cnpj.clone(),
                    external_reference: company_id.to_string(),
                })
                .await
            {
                Ok(id) => id,
                Err(err) => {
                    error!(?err, %company_id, "asaas customer creation failed");
                    return JsonResponse::server_error("Failed to create subscription")
                        .into_response();
                }
            };
            if let Err(err) = app_state
                .companies
                .set_asaas_customer_id(company_id, &created)
                .await
            {
                error!(?err, %company_id, "failed to store asaas customer id");
                return JsonResponse::server_error("Failed to create subscription").into_response();
            }
            created
        }
    };

    let remote = match asaas
        .create_subscription(&NewAsaasSubscription {
            customer,
            billing_type: body.billing_type,
            value_cents,
            next_due_date: body
                .next_due_date
                .unwrap_or_else(|| OffsetDateTime::now_utc().date()),
            cycle: body.cycle,
            description: format!("Plano {}", plan.name),
            external_reference: external_reference(company_id, plan.id),
        })
        .await
    {
        Ok(s) => s,
        Err(err) => {
            error!(?err, %company_id, "asaas subscription creation failed");
            return JsonResponse::server_error("Failed to create subscription").into_response();
        }
    };

    let sub = match app_state
        .reconciler()
        .prepare_checkout(
            company_id,
            BillingProvider::Asaas,
            &plan,
            body.cycle,
            Some(remote.id.clone()),
        )
        .await
    {
        Ok(s) => s,
        Err(err) => return billing_error_response(err),
    };

    info!(%company_id, asaas_subscription = %remote.id, plan = plan.code.as_str(), "asaas subscription created");
    Json(json!({
        "success": true,
        "subscriptionId": remote.id,
        "status": sub.status,
        "subscription": sub,
    }))
    .into_response()
}
