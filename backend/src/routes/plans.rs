use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::models::company::PlanCode;
use crate::models::plan::Plan;
use crate::responses::JsonResponse;
use crate::state::AppState;

// GET /api/plans
pub async fn list_plans(State(app_state): State<AppState>) -> Response {
    match app_state.plans.list_active_plans().await {
        Ok(plans) => Json(json!({ "success": true, "plans": plans })).into_response(),
        Err(err) => {
            error!(?err, "failed to list plans");
            JsonResponse::server_error("Failed to load plans").into_response()
        }
    }
}

/// Resolves a checkout plan from either an id or a code. Inactive plans are
/// treated as missing.
pub(crate) async fn resolve_selected_plan(
    app_state: &AppState,
    plan_id: Option<Uuid>,
    plan_code: Option<&str>,
) -> Result<Plan, Response> {
    let lookup = match (plan_id, plan_code) {
        (Some(id), _) => app_state.plans.find_plan_by_id(id).await,
        (None, Some(raw)) => match PlanCode::parse(raw) {
            Some(code) => app_state.plans.find_plan_by_code(code).await,
            None => return Err(JsonResponse::bad_request("Unknown plan").into_response()),
        },
        (None, None) => {
            return Err(JsonResponse::bad_request("planId or planCode is required").into_response())
        }
    };
    match lookup {
        Ok(Some(plan)) if plan.is_active => Ok(plan),
        Ok(_) => Err(JsonResponse::not_found("Plan not found").into_response()),
        Err(err) => {
            error!(?err, "failed to resolve plan");
            Err(JsonResponse::server_error("Failed to load plan").into_response())
        }
    }
}
