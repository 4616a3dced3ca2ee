use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use super::company_repository::CompanyRepository;
use super::execution_repository::ExecutionRepository;
use super::notification_repository::NotificationRepository;
use super::payment_repository::PaymentRepository;
use super::plan_repository::PlanRepository;
use super::processed_event_repository::ProcessedEventRepository;
use super::settings_repository::SettingsRepository;
use super::subscription_repository::SubscriptionRepository;
use super::user_repository::UserRepository;
use super::webhook_log_repository::{WebhookLogFilter, WebhookLogRepository};
use crate::models::company::{Company, Entitlements, NewCompany, PlanCode, UNLIMITED};
use crate::models::execution::{Execution, NewExecution};
use crate::models::notification::{NewNotification, Notification};
use crate::models::payment::{Payment, PaymentUpsert};
use crate::models::plan::Plan;
use crate::models::subscription::{
    BillingProvider, NewSubscription, Subscription, SubscriptionStatus,
};
use crate::models::system_setting::SystemSetting;
use crate::models::user::{User, UserRole};
use crate::models::webhook_log::{NewWebhookLog, WebhookLog, WebhookLogStatus};

/// In-memory stand-in for every repository trait.
#[derive(Default)]
pub struct MockDb {
    pub should_fail: bool,
    /// Makes `add_credits` fail so ledger release can be observed.
    pub fail_add_credits: Mutex<bool>,
    pub fail_notifications: Mutex<bool>,
    pub companies: Mutex<HashMap<Uuid, Company>>,
    pub users: Mutex<Vec<User>>,
    pub subscriptions: Mutex<HashMap<Uuid, Subscription>>,
    pub payments: Mutex<Vec<Payment>>,
    pub plans: Mutex<Vec<Plan>>,
    pub webhook_logs: Mutex<Vec<WebhookLog>>,
    pub notifications: Mutex<Vec<Notification>>,
    pub processed: Mutex<HashSet<String>>,
    pub released: Mutex<Vec<String>>,
    pub settings: Mutex<HashMap<String, SystemSetting>>,
    pub executions: Mutex<Vec<Execution>>,
}

fn mock_failure() -> sqlx::Error {
    sqlx::Error::Protocol("Mock DB failure".into())
}

pub fn catalog_plan(code: PlanCode) -> Plan {
    let (id, name, monthly, max_users, max_executions, credits) = match code {
        PlanCode::Starter => (1, "Starter", 9_700, 3, 100, 100),
        PlanCode::Professional => (2, "Professional", 29_700, 10, 500, 500),
        PlanCode::Business => (3, "Business", 69_700, 25, 2_000, 2_000),
        PlanCode::Enterprise => (4, "Enterprise", 0, UNLIMITED, UNLIMITED, 10_000),
    };
    Plan {
        id: Uuid::from_u128(id),
        code,
        name: name.to_string(),
        price_monthly_cents: monthly,
        price_yearly_cents: monthly * 10,
        max_users,
        max_executions,
        credits,
        stripe_price_monthly_id: Some(format!("price_{}_monthly", code.as_str().to_lowercase())),
        stripe_price_yearly_id: Some(format!("price_{}_yearly", code.as_str().to_lowercase())),
        is_active: true,
    }
}

pub fn sample_company(plan: PlanCode) -> Company {
    let now = OffsetDateTime::now_utc();
    let limits = catalog_plan(plan).entitlements();
    Company {
        id: Uuid::new_v4(),
        name: "Empresa Teste".into(),
        plan,
        credits: 50,
        max_users: limits.max_users,
        max_executions: limits.max_executions,
        is_trialing: false,
        trial_start_date: None,
        trial_end_date: None,
        stripe_customer_id: None,
        asaas_customer_id: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_user(company_id: Option<Uuid>, role: UserRole) -> User {
    let id = Uuid::new_v4();
    User {
        id,
        email: format!("{id}@empresa.com.br"),
        name: "Pessoa Teste".into(),
        company_id,
        role,
        created_at: OffsetDateTime::now_utc(),
    }
}

impl MockDb {
    /// Mock with the four catalog plans loaded.
    pub fn with_catalog() -> Self {
        let db = MockDb::default();
        *db.plans.lock().unwrap() = [
            PlanCode::Starter,
            PlanCode::Professional,
            PlanCode::Business,
            PlanCode::Enterprise,
        ]
        .into_iter()
        .map(catalog_plan)
        .collect();
        db
    }

    pub fn insert_company(&self, company: Company) {
        self.companies.lock().unwrap().insert(company.id, company);
    }

    pub fn insert_user(&self, user: User) {
        self.users.lock().unwrap().push(user);
    }

    pub fn insert_subscription(&self, subscription: Subscription) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.company_id, subscription);
    }

    pub fn company(&self, company_id: Uuid) -> Company {
        self.companies.lock().unwrap()[&company_id].clone()
    }

    pub fn subscription(&self, company_id: Uuid) -> Option<Subscription> {
        self.subscriptions.lock().unwrap().get(&company_id).cloned()
    }

    pub fn notifications_for_company(&self, company_id: Uuid) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.company_id == company_id)
            .cloned()
            .collect()
    }
}

pub fn sample_subscription(company_id: Uuid, status: SubscriptionStatus) -> Subscription {
    let now = OffsetDateTime::now_utc();
    Subscription {
        id: Uuid::new_v4(),
        company_id,
        plan_id: None,
        status,
        provider: None,
        value_cents: 0,
        cycle: Default::default(),
        next_due_date: None,
        stripe_subscription_id: None,
        asaas_subscription_id: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl CompanyRepository for MockDb {
    async fn find_company(&self, company_id: Uuid) -> Result<Option<Company>, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        Ok(self.companies.lock().unwrap().get(&company_id).cloned())
    }

    async fn find_company_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Company>, sqlx::Error> {
        Ok(self
            .companies
            .lock()
            .unwrap()
            .values()
            .find(|c| c.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn find_company_by_asaas_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Company>, sqlx::Error> {
        Ok(self
            .companies
            .lock()
            .unwrap()
            .values()
            .find(|c| c.asaas_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn create_company(&self, new_company: &NewCompany) -> Result<Company, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        let now = OffsetDateTime::now_utc();
        let company = Company {
            id: Uuid::new_v4(),
            name: new_company.name.clone(),
            plan: new_company.entitlements.plan,
            credits: new_company.credits,
            max_users: new_company.entitlements.max_users,
            max_executions: new_company.entitlements.max_executions,
            is_trialing: true,
            trial_start_date: Some(new_company.trial_start_date),
            trial_end_date: Some(new_company.trial_end_date),
            stripe_customer_id: None,
            asaas_customer_id: None,
            created_at: now,
            updated_at: now,
        };
        self.insert_company(company.clone());
        Ok(company)
    }

    async fn set_stripe_customer_id(
        &self,
        company_id: Uuid,
        customer_id: &str,
    ) -> Result<(), sqlx::Error> {
        if let Some(c) = self.companies.lock().unwrap().get_mut(&company_id) {
            c.stripe_customer_id = Some(customer_id.to_string());
        }
        Ok(())
    }

    async fn set_asaas_customer_id(
        &self,
        company_id: Uuid,
        customer_id: &str,
    ) -> Result<(), sqlx::Error> {
        if let Some(c) = self.companies.lock().unwrap().get_mut(&company_id) {
            c.asaas_customer_id = Some(customer_id.to_string());
        }
        Ok(())
    }

    async fn apply_entitlements(
        &self,
        company_id: Uuid,
        entitlements: Entitlements,
        end_trial: bool,
    ) -> Result<(), sqlx::Error> {
        if let Some(c) = self.companies.lock().unwrap().get_mut(&company_id) {
            c.plan = entitlements.plan;
            c.max_users = entitlements.max_users;
            c.max_executions = entitlements.max_executions;
            if end_trial {
                c.is_trialing = false;
            }
        }
        Ok(())
    }

    async fn add_credits(&self, company_id: Uuid, amount: i64) -> Result<i64, sqlx::Error> {
        if *self.fail_add_credits.lock().unwrap() {
            return Err(mock_failure());
        }
        let mut companies = self.companies.lock().unwrap();
        let company = companies
            .get_mut(&company_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        company.credits += amount;
        Ok(company.credits)
    }

    async fn try_consume_credits(
        &self,
        company_id: Uuid,
        cost: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        let mut companies = self.companies.lock().unwrap();
        let company = companies
            .get_mut(&company_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        if company.credits < cost {
            return Ok(None);
        }
        company.credits -= cost;
        Ok(Some(company.credits))
    }
}

#[async_trait]
impl UserRepository for MockDb {
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .cloned())
    }

    async fn list_company_admins(&self, company_id: Uuid) -> Result<Vec<User>, sqlx::Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.company_id == Some(company_id) && u.role == UserRole::Admin)
            .cloned()
            .collect())
    }

    async fn assign_company(
        &self,
        user_id: Uuid,
        company_id: Uuid,
        role: UserRole,
    ) -> Result<(), sqlx::Error> {
        if let Some(u) = self
            .users
            .lock()
            .unwrap()
            .iter_mut()
            .find(|u| u.id == user_id)
        {
            u.company_id = Some(company_id);
            u.role = role;
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepository for MockDb {
    async fn find_by_company(
        &self,
        company_id: Uuid,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        Ok(self.subscription(company_id))
    }

    async fn find_by_stripe_subscription(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .find(|s| s.stripe_subscription_id.as_deref() == Some(stripe_subscription_id))
            .cloned())
    }

    async fn find_by_asaas_subscription(
        &self,
        asaas_subscription_id: &str,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .find(|s| s.asaas_subscription_id.as_deref() == Some(asaas_subscription_id))
            .cloned())
    }

    async fn get_or_create(&self, new_sub: &NewSubscription) -> Result<Subscription, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        let mut subs = self.subscriptions.lock().unwrap();
        let sub = subs.entry(new_sub.company_id).or_insert_with(|| {
            let mut sub = sample_subscription(new_sub.company_id, SubscriptionStatus::Pending);
            sub.plan_id = new_sub.plan_id;
            sub.provider = new_sub.provider;
            sub.value_cents = new_sub.value_cents;
            sub.cycle = new_sub.cycle;
            sub
        });
        Ok(sub.clone())
    }

    async fn save(&self, subscription: &Subscription) -> Result<Subscription, sqlx::Error> {
        let mut saved = subscription.clone();
        saved.updated_at = OffsetDateTime::now_utc();
        self.subscriptions
            .lock()
            .unwrap()
            .insert(saved.company_id, saved.clone());
        Ok(saved)
    }

    async fn list_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }

    async fn list_stripe_linked(&self) -> Result<Vec<Subscription>, sqlx::Error> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.stripe_subscription_id.is_some())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentRepository for MockDb {
    async fn upsert_payment(&self, payment: &PaymentUpsert) -> Result<Payment, sqlx::Error> {
        let now = OffsetDateTime::now_utc();
        let mut payments = self.payments.lock().unwrap();
        if let Some(existing) = payments
            .iter_mut()
            .find(|p| p.provider == payment.provider && p.external_id == payment.external_id)
        {
            existing.subscription_id = payment.subscription_id.or(existing.subscription_id);
            existing.value_cents = payment.value_cents;
            existing.net_value_cents = payment.net_value_cents.or(existing.net_value_cents);
            existing.status = payment.status;
            existing.due_date = payment.due_date.or(existing.due_date);
            existing.payment_date = payment.payment_date.or(existing.payment_date);
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let row = Payment {
            id: Uuid::new_v4(),
            company_id: payment.company_id,
            subscription_id: payment.subscription_id,
            provider: payment.provider,
            external_id: payment.external_id.clone(),
            value_cents: payment.value_cents,
            net_value_cents: payment.net_value_cents,
            status: payment.status,
            due_date: payment.due_date,
            payment_date: payment.payment_date,
            created_at: now,
            updated_at: now,
        };
        payments.push(row.clone());
        Ok(row)
    }

    async fn find_payment(
        &self,
        provider: BillingProvider,
        external_id: &str,
    ) -> Result<Option<Payment>, sqlx::Error> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.provider == provider && p.external_id == external_id)
            .cloned())
    }
}

#[async_trait]
impl PlanRepository for MockDb {
    async fn list_active_plans(&self) -> Result<Vec<Plan>, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        Ok(self
            .plans
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn find_plan_by_id(&self, plan_id: Uuid) -> Result<Option<Plan>, sqlx::Error> {
        Ok(self
            .plans
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == plan_id)
            .cloned())
    }

    async fn find_plan_by_code(&self, code: PlanCode) -> Result<Option<Plan>, sqlx::Error> {
        Ok(self
            .plans
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.code == code)
            .cloned())
    }

    async fn find_plan_by_stripe_price(
        &self,
        price_id: &str,
    ) -> Result<Option<Plan>, sqlx::Error> {
        Ok(self
            .plans
            .lock()
            .unwrap()
            .iter()
            .find(|p| {
                p.stripe_price_monthly_id.as_deref() == Some(price_id)
                    || p.stripe_price_yearly_id.as_deref() == Some(price_id)
            })
            .cloned())
    }
}

#[async_trait]
impl WebhookLogRepository for MockDb {
    async fn insert_log(&self, log: &NewWebhookLog) -> Result<Uuid, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        let id = Uuid::new_v4();
        self.webhook_logs.lock().unwrap().push(WebhookLog {
            id,
            provider: log.provider,
            event_type: log.event_type.clone(),
            event_id: log.event_id.clone(),
            payload: log.payload.clone(),
            status: WebhookLogStatus::Processing,
            message: None,
            created_at: OffsetDateTime::now_utc(),
            processed_at: None,
        });
        Ok(id)
    }

    async fn finish_log(
        &self,
        log_id: Uuid,
        status: WebhookLogStatus,
        message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        if let Some(log) = self
            .webhook_logs
            .lock()
            .unwrap()
            .iter_mut()
            .find(|l| l.id == log_id)
        {
            log.status = status;
            log.message = message.map(str::to_string);
            log.processed_at = Some(OffsetDateTime::now_utc());
        }
        Ok(())
    }

    async fn list_logs(&self, filter: &WebhookLogFilter) -> Result<Vec<WebhookLog>, sqlx::Error> {
        let mut rows: Vec<WebhookLog> = self
            .webhook_logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| filter.provider.is_none_or(|p| p == l.provider))
            .filter(|l| filter.status.is_none_or(|s| s == l.status))
            .cloned()
            .collect();
        rows.reverse();
        Ok(rows
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for MockDb {
    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, sqlx::Error> {
        if *self.fail_notifications.lock().unwrap() {
            return Err(mock_failure());
        }
        let row = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            company_id: notification.company_id,
            kind: notification.kind,
            title: notification.title.clone(),
            message: notification.message.clone(),
            read: false,
            created_at: OffsetDateTime::now_utc(),
        };
        self.notifications.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut notifications = self.notifications.lock().unwrap();
        match notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id)
        {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let mut count = 0;
        for n in self
            .notifications
            .lock()
            .unwrap()
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            n.read = true;
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl ProcessedEventRepository for MockDb {
    async fn try_claim(&self, key: &str, _provider: BillingProvider) -> Result<bool, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        Ok(self.processed.lock().unwrap().insert(key.to_string()))
    }

    async fn release(&self, key: &str) -> Result<(), sqlx::Error> {
        self.processed.lock().unwrap().remove(key);
        self.released.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for MockDb {
    async fn list_settings(&self) -> Result<Vec<SystemSetting>, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        Ok(self.settings.lock().unwrap().values().cloned().collect())
    }

    async fn upsert_setting(
        &self,
        key: &str,
        value: &str,
        encrypted: bool,
    ) -> Result<(), sqlx::Error> {
        self.settings.lock().unwrap().insert(
            key.to_string(),
            SystemSetting {
                key: key.to_string(),
                value: value.to_string(),
                encrypted,
                updated_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl ExecutionRepository for MockDb {
    async fn count_since(
        &self,
        company_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<i64, sqlx::Error> {
        Ok(self
            .executions
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.company_id == company_id && e.created_at >= since)
            .count() as i64)
    }

    async fn record_execution(&self, execution: &NewExecution) -> Result<Execution, sqlx::Error> {
        let row = Execution {
            id: Uuid::new_v4(),
            company_id: execution.company_id,
            user_id: execution.user_id,
            agent: execution.agent.clone(),
            credits_used: execution.credits_used,
            created_at: OffsetDateTime::now_utc(),
        };
        self.executions.lock().unwrap().push(row.clone());
        Ok(row)
    }
}
