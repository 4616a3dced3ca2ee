use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::billing::events::BillingProvider;
use crate::billing::ingest::{ingest, WebhookDelivery};
use crate::models::subscription::{BillingCycle, SubscriptionStatus};
use crate::responses::JsonResponse;
use crate::routes::auth::{require_company_admin, session::AuthSession};
use crate::routes::{billing_error_response, plans::resolve_selected_plan};
use crate::services::stripe::CreateCheckoutSessionRequest;
use crate::state::AppState;

// POST /api/stripe/webhook
pub async fn webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let sig = match headers
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
    {
        Some(s) => s,
        None => return JsonResponse::bad_request("Missing Stripe-Signature").into_response(),
    };

    let settings = match app_state.settings.load().await {
        Ok(s) => s,
        Err(err) => {
            error!(?err, "failed to load billing settings for stripe webhook");
            return JsonResponse::server_error("Failed to load settings").into_response();
        }
    };

    let stripe = app_state.stripe.get(&settings.stripe_secret_key);
    let evt = match stripe.verify_webhook(&body, sig, &settings.stripe_webhook_secret) {
        Ok(evt) => evt,
        Err(err) => {
            warn!(?err, "stripe webhook verification failed");
            return JsonResponse::bad_request("Invalid webhook signature").into_response();
        }
    };

    let reconciler = app_state.reconciler();
    match ingest(
        app_state.webhook_logs.as_ref(),
        &reconciler,
        WebhookDelivery::stripe(evt.payload),
    )
    .await
    {
        Ok(_) => Json(json!({ "received": true })).into_response(),
        Err(_) => JsonResponse::server_error("Failed to process webhook").into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub plan_id: Option<Uuid>,
    pub plan_code: Option<String>,
    #[serde(default)]
    pub cycle: BillingCycle,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

// POST /api/stripe/checkout-session
pub async fn create_checkout_session(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(body): Json<CheckoutBody>,
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
    let Some(price_id) = plan.stripe_price_id(body.cycle).map(str::to_string) else {
        return JsonResponse::bad_request("Plan is not available for card checkout")
            .into_response();
    };

    let company = match app_state.companies.find_company(company_id).await {
        Ok(Some(c)) => c,
        Ok(None) => return JsonResponse::not_found("Company not found").into_response(),
        Err(err) => {
            error!(?err, %company_id, "failed to load company for checkout");
            return JsonResponse::server_error("Failed to start checkout").into_response();
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
            error!(?err, %company_id, "failed to load subscription for checkout");
            return JsonResponse::server_error("Failed to start checkout").into_response();
        }
    }

    let settings = match app_state.settings.load().await {
        Ok(s) => s,
        Err(err) => {
            error!(?err, "failed to load billing settings for checkout");
            return JsonResponse::server_error("Failed to start checkout").into_response();
        }
    };
    if settings.stripe_secret_key.is_empty() {
        return JsonResponse::server_error("Stripe is not configured").into_response();
    }
    let stripe = app_state.stripe.get(&settings.stripe_secret_key);

    let mut metadata = BTreeMap::new();
    metadata.insert("companyId".to_string(), company_id.to_string());
    metadata.insert("planId".to_string(), plan.id.to_string());
    metadata.insert("plan".to_string(), plan.code.as_str().to_string());
    metadata.insert("cycle".to_string(), body.cycle.as_str().to_string());

    let customer = match company.stripe_customer_id.clone() {
        Some(existing) => existing,
        None => {
            let created = match stripe
                .create_customer(
                    &member.user.email,
                    Some(company.name.as_str()),
                    BTreeMap::from([("companyId".to_string(), company_id.to_string())]),
                )
                .await
            {
                Ok(id) => id,
                Err(err) => {
                    error!(?err, %company_id, "stripe customer creation failed");
                    return JsonResponse::server_error("Failed to start checkout").into_response();
                }
            };
            if let Err(err) = app_state
                .companies
                .set_stripe_customer_id(company_id, &created)
                .await
            {
                error!(?err, %company_id, "failed to store stripe customer id");
                return JsonResponse::server_error("Failed to start checkout").into_response();
            }
            created
        }
    };

    let origin = app_state.config.frontend_origin.trim_end_matches('/');
    let request = CreateCheckoutSessionRequest {
        success_url: body.success_url.unwrap_or_else(|| {
            format!("{origin}/billing/success?session_id={{CHECKOUT_SESSION_ID}}")
        }),
        cancel_url: body
            .cancel_url
            .unwrap_or_else(|| format!("{origin}/billing/cancel")),
        price_id,
        customer,
        client_reference_id: Some(company_id.to_string()),
        metadata,
    };

    let session = match stripe.create_checkout_session(request).await {
        Ok(s) => s,
        Err(err) => {
            error!(?err, %company_id, "stripe checkout session creation failed");
            return JsonResponse::server_error("Failed to start checkout").into_response();
        }
    };

    if let Err(err) = app_state
        .reconciler()
        .prepare_checkout(company_id, BillingProvider::Stripe, &plan, body.cycle, None)
        .await
    {
        return billing_error_response(err);
    }

    info!(%company_id, plan = plan.code.as_str(), session_id = %session.id, "stripe checkout started");
    Json(json!({
        "success": true,
        "url": session.url,
        "sessionId": session.id,
    }))
    .into_response()
}
