use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::BillingError;
use crate::db::{
    company_repository::CompanyRepository, subscription_repository::SubscriptionRepository,
};
use crate::models::company::{Company, PlanCode};
use crate::models::subscription::{Subscription, SubscriptionStatus};
use crate::services::settings::SettingsService;

pub const TRIAL_EXPIRED: &str = "TRIAL_EXPIRED";
pub const CARD_REQUIRED: &str = "CARD_REQUIRED";
pub const NO_ACTIVE_SUBSCRIPTION: &str = "NO_ACTIVE_SUBSCRIPTION";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl AccessDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            code: None,
        }
    }

    fn deny(code: &'static str, reason: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            code: Some(code),
        }
    }
}

/// Whether the company may run agents right now. Rules are checked in order;
/// an expired trial is denied no matter what the card setting says.
pub fn can_execute_agents(
    company: &Company,
    subscription: Option<&Subscription>,
    allow_trial_without_card: bool,
    now: OffsetDateTime,
) -> AccessDecision {
    if company.plan == PlanCode::Enterprise {
        return AccessDecision::allow();
    }

    if company.is_trialing {
        if company.trial_expired(now) {
            return AccessDecision::deny(
                TRIAL_EXPIRED,
                "Trial expirado. Assine um plano para continuar usando os agentes.",
            );
        }
        if !allow_trial_without_card {
            return AccessDecision::deny(
                CARD_REQUIRED,
                "Cadastre um cartão para usar o período de teste.",
            );
        }
        return AccessDecision::allow();
    }

    match subscription.map(|s| s.status) {
        Some(SubscriptionStatus::Active) => AccessDecision::allow(),
        _ => AccessDecision::deny(
            NO_ACTIVE_SUBSCRIPTION,
            "Nenhuma assinatura ativa. Assine um plano para continuar usando os agentes.",
        ),
    }
}

pub struct AccessService {
    pub companies: Arc<dyn CompanyRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub settings: Arc<SettingsService>,
}

impl AccessService {
    /// Loads the company's current state and applies [`can_execute_agents`].
    pub async fn check(
        &self,
        company_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<(Company, AccessDecision), BillingError> {
        let company = self
            .companies
            .find_company(company_id)
            .await?
            .ok_or(BillingError::CompanyNotFound(company_id))?;
        let subscription = self.subscriptions.find_by_company(company_id).await?;
        let settings = self.settings.load().await?;

        let decision = can_execute_agents(
            &company,
            subscription.as_ref(),
            settings.allow_trial_without_card,
            now,
        );
        Ok((company, decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::reconciler::test_support::reconciler;
    use crate::config::Config;
    use crate::db::mock_db::{sample_company, sample_subscription, MockDb};
    use time::Duration;

    fn trialing(ends_in: Duration) -> Company {
        let now = OffsetDateTime::now_utc();
        let mut company = sample_company(PlanCode::Starter);
        company.is_trialing = true;
        company.trial_start_date = Some(now - Duration::days(14));
        company.trial_end_date = Some(now + ends_in);
        company
    }

    #[test]
    fn expired_trial_denied_regardless_of_card_setting() {
        let company = trialing(Duration::hours(-1));
        let now = OffsetDateTime::now_utc();
        for allow_without_card in [true, false] {
            let decision = can_execute_agents(&company, None, allow_without_card, now);
            assert!(!decision.allowed);
            assert_eq!(decision.code, Some(TRIAL_EXPIRED));
            assert!(decision.reason.unwrap().contains("Trial expirado"));
        }
    }

    #[test]
    fn running_trial_depends_on_card_setting() {
        let company = trialing(Duration::days(3));
        let now = OffsetDateTime::now_utc();
        assert!(can_execute_agents(&company, None, true, now).allowed);
        assert_eq!(
            can_execute_agents(&company, None, false, now).code,
            Some(CARD_REQUIRED)
        );
    }

    #[test]
    fn enterprise_always_allowed() {
        let mut company = trialing(Duration::days(-30));
        company.plan = PlanCode::Enterprise;
        let decision = can_execute_agents(&company, None, false, OffsetDateTime::now_utc());
        assert_eq!(decision, AccessDecision::allow());
    }

    #[test]
    fn paid_company_needs_active_subscription() {
        let company = sample_company(PlanCode::Business);
        let now = OffsetDateTime::now_utc();
        assert_eq!(
            can_execute_agents(&company, None, true, now).code,
            Some(NO_ACTIVE_SUBSCRIPTION)
        );
        for (status, allowed) in [
            (SubscriptionStatus::Active, true),
            (SubscriptionStatus::Pending, false),
            (SubscriptionStatus::Overdue, false),
            (SubscriptionStatus::Canceled, false),
            (SubscriptionStatus::Expired, false),
        ] {
            let sub = sample_subscription(company.id, status);
            assert_eq!(
                can_execute_agents(&company, Some(&sub), true, now).allowed,
                allowed,
                "{status}"
            );
        }
    }

    #[tokio::test]
    async fn admin_upgrade_lifts_expired_trial_block() {
        let db = Arc::new(MockDb::with_catalog());
        let company = trialing(Duration::days(-1));
        let company_id = company.id;
        db.insert_company(company);
        let config = Config::for_tests();
        let service = AccessService {
            companies: db.clone(),
            subscriptions: db.clone(),
            settings: Arc::new(SettingsService::new(
                db.clone(),
                config.settings_encryption_key.clone(),
                config.stripe.clone(),
                config.asaas.clone(),
            )),
        };
        let now = OffsetDateTime::now_utc();

        let (_, before) = service.check(company_id, now).await.unwrap();
        assert_eq!(before.code, Some(TRIAL_EXPIRED));

        reconciler(&db)
            .admin_set_plan(company_id, PlanCode::Professional, 0)
            .await
            .unwrap();

        let (company, after) = service.check(company_id, now).await.unwrap();
        assert!(after.allowed);
        assert_eq!(company.plan, PlanCode::Professional);
    }

    #[tokio::test]
    async fn unknown_company_is_an_error() {
        let db = Arc::new(MockDb::default());
        let service = AccessService {
            companies: db.clone(),
            subscriptions: db.clone(),
            settings: Arc::new(SettingsService::new(
                db.clone(),
                None,
                Default::default(),
                Default::default(),
            )),
        };
        assert!(matches!(
            service.check(Uuid::new_v4(), OffsetDateTime::now_utc()).await,
            Err(BillingError::CompanyNotFound(_))
        ));
    }
}
