use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use time::OffsetDateTime;
use tracing::error;

use crate::models::company::{Company, UNLIMITED};
use crate::models::plan::Plan;
use crate::models::subscription::Subscription;
use crate::responses::JsonResponse;
use crate::routes::auth::{require_member, session::AuthSession};
use crate::routes::billing_error_response;
use crate::state::AppState;

/// Start of the calendar month (UTC) that `now` falls in.
pub(crate) fn month_start(now: OffsetDateTime) -> OffsetDateTime {
    let today = now.date();
    today
        .replace_day(1)
        .unwrap_or(today)
        .midnight()
        .assume_utc()
}

/// Share of the monthly execution allowance used, capped at 100.
/// `None` for unlimited plans.
fn usage_percentage(used: i64, max_executions: i32) -> Option<i64> {
    if max_executions == UNLIMITED {
        return None;
    }
    if max_executions <= 0 {
        return Some(100);
    }
    Some((used * 100 / i64::from(max_executions)).min(100))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingOverview {
    pub company: Company,
    pub executions_this_month: i64,
    pub usage_percentage: Option<i64>,
    pub subscription: Option<Subscription>,
    pub current_plan: Option<Plan>,
}

// GET /api/company/access
pub async fn access(State(app_state): State<AppState>, AuthSession(claims): AuthSession) -> Response {
    let member = match require_member(&app_state, &claims).await {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    match app_state
        .access()
        .check(member.company_id, OffsetDateTime::now_utc())
        .await
    {
        Ok((_, decision)) => Json(json!({ "success": true, "access": decision })).into_response(),
        Err(err) => billing_error_response(err),
    }
}

// GET /api/company/billing
pub async fn billing_overview(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let member = match require_member(&app_state, &claims).await {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    let company_id = member.company_id;

    let company = match app_state.companies.find_company(company_id).await {
        Ok(Some(c)) => c,
        Ok(None) => return JsonResponse::not_found("Company not found").into_response(),
        Err(err) => {
            error!(?err, %company_id, "failed to load company");
            return JsonResponse::server_error("Failed to load billing").into_response();
        }
    };

    let since = month_start(OffsetDateTime::now_utc());
    let executions_this_month = match app_state.executions.count_since(company_id, since).await {
        Ok(n) => n,
        Err(err) => {
            error!(?err, %company_id, "failed to count executions");
            return JsonResponse::server_error("Failed to load billing").into_response();
        }
    };

    let subscription = match app_state.subscriptions.find_by_company(company_id).await {
        Ok(s) => s,
        Err(err) => {
            error!(?err, %company_id, "failed to load subscription");
            return JsonResponse::server_error("Failed to load billing").into_response();
        }
    };

    let current_plan = match app_state.plans.find_plan_by_code(company.plan).await {
        Ok(p) => p,
        Err(err) => {
            error!(?err, %company_id, "failed to load plan");
            return JsonResponse::server_error("Failed to load billing").into_response();
        }
    };

    let overview = BillingOverview {
        usage_percentage: usage_percentage(executions_this_month, company.max_executions),
        company,
        executions_this_month,
        subscription,
        current_plan,
    };
    Json(json!({ "success": true, "billing": overview })).into_response()
}

#[cfg(test)]
mod tests {
    use axum::{body::to_bytes, http::StatusCode};
    use time::macros::datetime;

    use super::*;
    use crate::db::execution_repository::ExecutionRepository;
    use crate::db::mock_db::{sample_company, sample_subscription, sample_user, MockDb};
    use crate::models::company::PlanCode;
    use crate::models::execution::NewExecution;
    use crate::models::subscription::SubscriptionStatus;
    use crate::models::user::UserRole;
    use crate::state::test_support::{claims_for, test_state};

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn month_window_and_usage() {
        assert_eq!(
            month_start(datetime!(2026-10-18 15:30 UTC)),
            datetime!(2026-10-01 0:00 UTC)
        );
        assert_eq!(usage_percentage(50, 100), Some(50));
        assert_eq!(usage_percentage(250, 100), Some(100));
        assert_eq!(usage_percentage(10, UNLIMITED), None);
    }

    #[tokio::test]
    async fn access_reports_expired_trial() {
        let ctx = test_state(MockDb::with_catalog());
        let mut company = sample_company(PlanCode::Starter);
        company.is_trialing = true;
        company.trial_end_date = Some(OffsetDateTime::now_utc() - time::Duration::days(1));
        let user = sample_user(Some(company.id), UserRole::User);
        ctx.db.insert_company(company);
        ctx.db.insert_user(user.clone());

        let res = access(State(ctx.state.clone()), AuthSession(claims_for(&user))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["access"]["allowed"], false);
        assert_eq!(json["access"]["code"], "TRIAL_EXPIRED");
    }

    #[tokio::test]
    async fn billing_overview_counts_monthly_usage() {
        let ctx = test_state(MockDb::with_catalog());
        let company = sample_company(PlanCode::Starter);
        let company_id = company.id;
        let user = sample_user(Some(company_id), UserRole::User);
        ctx.db.insert_company(company);
        ctx.db.insert_user(user.clone());
        ctx.db
            .insert_subscription(sample_subscription(company_id, SubscriptionStatus::Active));
        for _ in 0..25 {
            ctx.db
                .record_execution(&NewExecution {
                    company_id,
                    user_id: user.id,
                    agent: "triagem".into(),
                    credits_used: 1,
                })
                .await
                .unwrap();
        }

        let res = billing_overview(State(ctx.state.clone()), AuthSession(claims_for(&user))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["billing"]["executionsThisMonth"], 25);
        assert_eq!(json["billing"]["usagePercentage"], 25);
        assert_eq!(json["billing"]["subscription"]["status"], "ACTIVE");
        assert_eq!(json["billing"]["currentPlan"]["code"], "STARTER");
        assert_eq!(json["billing"]["company"]["credits"], 50);
    }
}
