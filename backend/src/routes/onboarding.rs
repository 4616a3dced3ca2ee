use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use time::{Duration, OffsetDateTime};
use tracing::{error, info};

use crate::models::company::{Entitlements, NewCompany, PlanCode};
use crate::models::user::UserRole;
use crate::responses::JsonResponse;
use crate::routes::auth::{load_user, session::AuthSession};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OnboardingBody {
    pub name: String,
}

// POST /api/onboarding/company
pub async fn create_company(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(body): Json<OnboardingBody>,
) -> Response {
    let user = match load_user(&app_state, &claims).await {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if user.company_id.is_some() {
        return JsonResponse::conflict("User already belongs to a company").into_response();
    }
    let name = body.name.trim();
    if name.is_empty() {
        return JsonResponse::bad_request("Company name is required").into_response();
    }

    let settings = match app_state.settings.load().await {
        Ok(s) => s,
        Err(err) => {
            error!(?err, "failed to load trial settings");
            return JsonResponse::server_error("Failed to create company").into_response();
        }
    };
    let entitlements = match app_state.plans.find_plan_by_code(PlanCode::Starter).await {
        Ok(Some(plan)) => plan.entitlements(),
        Ok(None) => Entitlements::STARTER_FALLBACK,
        Err(err) => {
            error!(?err, "failed to load starter plan");
            return JsonResponse::server_error("Failed to create company").into_response();
        }
    };

    let now = OffsetDateTime::now_utc();
    let Some(trial_end_date) = now.checked_add(Duration::days(settings.trial_days)) else {
        error!(trial_days = settings.trial_days, "trial length overflows the calendar");
        return JsonResponse::server_error("Failed to create company").into_response();
    };
    let company = match app_state
        .companies
        .create_company(&NewCompany {
            name: name.to_string(),
            entitlements,
            credits: settings.trial_credits,
            trial_start_date: now,
            trial_end_date,
        })
        .await
    {
        Ok(c) => c,
        Err(err) => {
            error!(?err, user_id = %user.id, "failed to create company");
            return JsonResponse::server_error("Failed to create company").into_response();
        }
    };

    if let Err(err) = app_state
        .users
        .assign_company(user.id, company.id, UserRole::Admin)
        .await
    {
        error!(?err, user_id = %user.id, company_id = %company.id, "failed to link user to company");
        return JsonResponse::server_error("Failed to create company").into_response();
    }

    info!(company_id = %company.id, user_id = %user.id, trial_days = settings.trial_days, "company onboarded");
    Json(json!({ "success": true, "company": company })).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::db::mock_db::{sample_user, MockDb};
    use crate::services::settings::SettingsUpdate;
    use crate::state::test_support::{claims_for, test_state};

    #[tokio::test]
    async fn onboarding_starts_trial_from_settings() {
        let ctx = test_state(MockDb::with_catalog());
        ctx.state
            .settings
            .update(SettingsUpdate {
                trial_days: Some(7),
                trial_credits: Some(30),
                ..Default::default()
            })
            .await
            .unwrap();
        let user = sample_user(None, UserRole::User);
        ctx.db.insert_user(user.clone());

        let res = create_company(
            State(ctx.state.clone()),
            AuthSession(claims_for(&user)),
            Json(OnboardingBody {
                name: "Recursos Humanos Ltda".into(),
            }),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        let company = ctx.db.companies.lock().unwrap().values().next().cloned().unwrap();
        assert!(company.is_trialing);
        assert_eq!(company.credits, 30);
        assert_eq!(company.plan, PlanCode::Starter);
        assert_eq!(company.max_users, 3);
        let length = company.trial_end_date.unwrap() - company.trial_start_date.unwrap();
        assert_eq!(length, Duration::days(7));

        let linked = ctx.db.users.lock().unwrap()[0].clone();
        assert_eq!(linked.company_id, Some(company.id));
        assert_eq!(linked.role, UserRole::Admin);
        assert!(ctx.db.subscriptions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_company_is_refused() {
        let ctx = test_state(MockDb::with_catalog());
        let user = sample_user(Some(uuid::Uuid::new_v4()), UserRole::Admin);
        ctx.db.insert_user(user.clone());

        let res = create_company(
            State(ctx.state.clone()),
            AuthSession(claims_for(&user)),
            Json(OnboardingBody { name: "Outra".into() }),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn oversized_stored_trial_is_capped() {
        use crate::db::settings_repository::SettingsRepository;
        use crate::services::settings::{MAX_TRIAL_DAYS, TRIAL_DAYS};

        let ctx = test_state(MockDb::with_catalog());
        ctx.db
            .upsert_setting(TRIAL_DAYS, "1000000000000000", false)
            .await
            .unwrap();
        let user = sample_user(None, UserRole::User);
        ctx.db.insert_user(user.clone());

        let res = create_company(
            State(ctx.state.clone()),
            AuthSession(claims_for(&user)),
            Json(OnboardingBody {
                name: "Folha Certa".into(),
            }),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        let company = ctx.db.companies.lock().unwrap().values().next().cloned().unwrap();
        let length = company.trial_end_date.unwrap() - company.trial_start_date.unwrap();
        assert_eq!(length, Duration::days(MAX_TRIAL_DAYS));
    }
}
