use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{error, info};

use crate::models::company::UNLIMITED;
use crate::models::execution::NewExecution;
use crate::responses::JsonResponse;
use crate::routes::auth::{require_member, session::AuthSession};
use crate::routes::billing_error_response;
use crate::routes::company::month_start;
use crate::state::AppState;

pub const DEFAULT_EXECUTION_COST: i64 = 1;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionBody {
    pub agent: String,
}

/// Credits charged for one run of `agent`. `token_pricing` maps agent names
/// (or `"default"`) to a positive integer cost.
pub fn execution_cost(token_pricing: &Value, agent: &str) -> i64 {
    [agent, "default"]
        .iter()
        .find_map(|key| token_pricing.get(*key).and_then(Value::as_i64))
        .filter(|cost| *cost > 0)
        .unwrap_or(DEFAULT_EXECUTION_COST)
}

// POST /api/executions
pub async fn run_execution(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(body): Json<ExecutionBody>,
) -> Response {
    let member = match require_member(&app_state, &claims).await {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    let company_id = member.company_id;
    let agent = body.agent.trim();
    if agent.is_empty() {
        return JsonResponse::bad_request("agent is required").into_response();
    }

    let now = OffsetDateTime::now_utc();
    let (company, decision) = match app_state.access().check(company_id, now).await {
        Ok(r) => r,
        Err(err) => return billing_error_response(err),
    };
    if !decision.allowed {
        return JsonResponse::forbidden_with_code(
            decision.reason.as_deref().unwrap_or("Acesso negado"),
            decision.code.unwrap_or("ACCESS_DENIED"),
        )
        .into_response();
    }

    if company.max_executions != UNLIMITED {
        match app_state
            .executions
            .count_since(company_id, month_start(now))
            .await
        {
            Ok(used) if used >= i64::from(company.max_executions) => {
                return JsonResponse::payment_required(
                    "Limite mensal de execuções atingido.",
                    "EXECUTION_LIMIT_REACHED",
                )
                .into_response();
            }
            Ok(_) => {}
            Err(err) => {
                error!(?err, %company_id, "failed to count executions");
                return JsonResponse::server_error("Failed to run agent").into_response();
            }
        }
    }

    let cost = match app_state.settings.load().await {
        Ok(settings) => execution_cost(&settings.token_pricing, agent),
        Err(err) => {
            error!(?err, "failed to load token pricing");
            return JsonResponse::server_error("Failed to run agent").into_response();
        }
    };

    let remaining = match app_state
        .companies
        .try_consume_credits(company_id, cost)
        .await
    {
        Ok(Some(balance)) => balance,
        Ok(None) => {
            return JsonResponse::payment_required("Créditos insuficientes.", "INSUFFICIENT_CREDITS")
                .into_response();
        }
        Err(err) => {
            error!(?err, %company_id, "failed to consume credits");
            return JsonResponse::server_error("Failed to run agent").into_response();
        }
    };

    let execution = match app_state
        .executions
        .record_execution(&NewExecution {
            company_id,
            user_id: member.user.id,
            agent: agent.to_string(),
            credits_used: cost,
        })
        .await
    {
        Ok(e) => e,
        Err(err) => {
            // credits stay debited
            error!(?err, %company_id, agent, "failed to record execution");
            return JsonResponse::server_error("Failed to record execution").into_response();
        }
    };

    info!(%company_id, agent, cost, remaining, "agent execution recorded");
    Json(json!({
        "success": true,
        "execution": execution,
        "remainingCredits": remaining,
    }))
    .into_response()
}
