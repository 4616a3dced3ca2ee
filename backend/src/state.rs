use std::sync::Arc;

use crate::billing::access::AccessService;
use crate::billing::reconciler::{BillingRepos, EntitlementReconciler};
use crate::config::Config;
use crate::db::{
    company_repository::CompanyRepository, execution_repository::ExecutionRepository,
    notification_repository::NotificationRepository, payment_repository::PaymentRepository,
    plan_repository::PlanRepository, processed_event_repository::ProcessedEventRepository,
    subscription_repository::SubscriptionRepository, user_repository::UserRepository,
    webhook_log_repository::WebhookLogRepository,
};
use crate::services::asaas::AsaasService;
use crate::services::client_cache::ClientCache;
use crate::services::settings::SettingsService;
use crate::services::stripe::StripeService;
use crate::utils::jwt::{JwtKeys, SessionAuthority};

#[derive(Clone)]
pub struct AppState {
    pub companies: Arc<dyn CompanyRepository>,
    pub users: Arc<dyn UserRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub plans: Arc<dyn PlanRepository>,
    pub webhook_logs: Arc<dyn WebhookLogRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub processed_events: Arc<dyn ProcessedEventRepository>,
    pub executions: Arc<dyn ExecutionRepository>,
    pub settings: Arc<SettingsService>,
    /// Rebuilt whenever the Stripe secret key changes.
    pub stripe: Arc<ClientCache<dyn StripeService>>,
    pub asaas: Arc<ClientCache<dyn AsaasService>>,
    pub config: Arc<Config>,
    pub jwt_keys: Arc<JwtKeys>,
}

impl AppState {
    pub fn reconciler(&self) -> EntitlementReconciler {
        EntitlementReconciler::new(BillingRepos {
            companies: self.companies.clone(),
            users: self.users.clone(),
            subscriptions: self.subscriptions.clone(),
            payments: self.payments.clone(),
            plans: self.plans.clone(),
            notifications: self.notifications.clone(),
            ledger: self.processed_events.clone(),
        })
    }

    pub fn access(&self) -> AccessService {
        AccessService {
            companies: self.companies.clone(),
            subscriptions: self.subscriptions.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl SessionAuthority for AppState {
    fn session_keys(&self) -> &JwtKeys {
        &self.jwt_keys
    }

    fn session_issuer(&self) -> &str {
        &self.config.jwt_issuer
    }

    fn session_audience(&self) -> &str {
        &self.config.jwt_audience
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::mock_db::MockDb;
    use crate::models::user::{User, UserRole};
    use crate::routes::auth::claims::Claims;
    use crate::services::asaas::MockAsaasService;
    use crate::services::stripe::MockStripeService;
    use crate::utils::jwt::issue_session_token;

    pub const TEST_JWT_SECRET: &str = "0123456789abcdef0123456789abcdef";

    pub struct TestContext {
        pub state: AppState,
        pub db: Arc<MockDb>,
        pub stripe: Arc<MockStripeService>,
        pub asaas: Arc<MockAsaasService>,
    }

    pub fn test_state(db: MockDb) -> TestContext {
        test_state_with_config(db, Config::for_tests())
    }

    pub fn test_state_with_config(db: MockDb, config: Config) -> TestContext {
        let db = Arc::new(db);
        let config = Arc::new(config);
        let stripe = Arc::new(MockStripeService::default());
        let asaas = Arc::new(MockAsaasService::default());
        let settings = Arc::new(SettingsService::new(
            db.clone(),
            config.settings_encryption_key.clone(),
            config.stripe.clone(),
            config.asaas.clone(),
        ));
        let state = AppState {
            companies: db.clone(),
            users: db.clone(),
            subscriptions: db.clone(),
            payments: db.clone(),
            plans: db.clone(),
            webhook_logs: db.clone(),
            notifications: db.clone(),
            processed_events: db.clone(),
            executions: db.clone(),
            settings,
            stripe: Arc::new(ClientCache::fixed(stripe.clone() as Arc<dyn StripeService>)),
            asaas: Arc::new(ClientCache::fixed(asaas.clone() as Arc<dyn AsaasService>)),
            config,
            jwt_keys: Arc::new(
                JwtKeys::from_secret(TEST_JWT_SECRET).expect("test secret is valid"),
            ),
        };
        TestContext {
            state,
            db,
            stripe,
            asaas,
        }
    }

    /// Claims for `user` as the session extractor would produce them.
    pub fn claims_for(user: &User) -> Claims {
        Claims {
            id: user.id.to_string(),
            email: user.email.clone(),
            company_id: user.company_id.map(|id| id.to_string()),
            role: user.role,
            exp: (time::OffsetDateTime::now_utc().unix_timestamp() + 3600) as usize,
            iss: String::new(),
            aud: String::new(),
        }
    }

    pub fn bearer_for(state: &AppState, user: &User) -> String {
        let token = issue_session_token(state, user, time::Duration::hours(1))
            .expect("token encodes");
        format!("Bearer {token}")
    }

    pub fn super_admin() -> User {
        crate::db::mock_db::sample_user(None, UserRole::SuperAdmin)
    }
}
