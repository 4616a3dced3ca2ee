use std::future::Future;
use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::{BillingEvent, BillingEventKind, BillingProvider, CompanyRef, PlanRef};
use super::state_machine::Actor;
use super::BillingError;
use crate::db::{
    company_repository::CompanyRepository, notification_repository::NotificationRepository,
    payment_repository::PaymentRepository, plan_repository::PlanRepository,
    processed_event_repository::ProcessedEventRepository,
    subscription_repository::SubscriptionRepository, user_repository::UserRepository,
};
use crate::models::company::{Company, Entitlements, PlanCode};
use crate::models::notification::{NewNotification, NotificationKind};
use crate::models::payment::PaymentUpsert;
use crate::models::plan::Plan;
use crate::models::subscription::{
    BillingCycle, NewSubscription, Subscription, SubscriptionStatus,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied {
        company_id: Uuid,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
        credits_granted: i64,
    },
    Ignored {
        reason: String,
    },
}

impl ReconcileOutcome {
    fn ignored(reason: impl Into<String>) -> Self {
        ReconcileOutcome::Ignored {
            reason: reason.into(),
        }
    }

    /// One-line description stored on the webhook log.
    pub fn summary(&self) -> String {
        match self {
            ReconcileOutcome::Applied {
                company_id,
                from,
                to,
                credits_granted,
            } => format!("company {company_id}: {from} -> {to}, credits +{credits_granted}"),
            ReconcileOutcome::Ignored { reason } => format!("ignored: {reason}"),
        }
    }
}

/// Repositories the reconciler writes through.
#[derive(Clone)]
pub struct BillingRepos {
    pub companies: Arc<dyn CompanyRepository>,
    pub users: Arc<dyn UserRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub plans: Arc<dyn PlanRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub ledger: Arc<dyn ProcessedEventRepository>,
}

pub struct EntitlementReconciler {
    pub(super) repos: BillingRepos,
}

struct Notice {
    kind: NotificationKind,
    title: &'static str,
    message: String,
}

impl EntitlementReconciler {
    pub fn new(repos: BillingRepos) -> Self {
        Self { repos }
    }

    /// Applies a normalized provider event to the owning company.
    pub async fn apply(&self, event: &BillingEvent) -> Result<ReconcileOutcome, BillingError> {
        let Some(company) = self.resolve_company(&event.company).await? else {
            warn!(
                provider = event.provider.as_str(),
                event_id = %event.event_id,
                refs = ?event.company,
                "billing event does not match any company"
            );
            return Ok(ReconcileOutcome::ignored("no company matches the event"));
        };

        let mut sub = self
            .repos
            .subscriptions
            .get_or_create(&NewSubscription::pending(company.id, Some(event.provider)))
            .await?;
        if let Some(current) = sub.provider.filter(|p| *p != event.provider) {
            warn!(
                %company.id,
                current = current.as_str(),
                incoming = event.provider.as_str(),
                "billing event from a different provider than the stored subscription"
            );
        }

        self.link_provider_ids(&company, &mut sub, event).await?;

        if let Some(payment) = &event.payment {
            self.repos
                .payments
                .upsert_payment(&PaymentUpsert {
                    company_id: company.id,
                    subscription_id: Some(sub.id),
                    provider: event.provider,
                    external_id: payment.external_id.clone(),
                    value_cents: event.amount_cents.unwrap_or(0),
                    net_value_cents: payment.net_value_cents,
                    status: payment.status,
                    due_date: event.due_date,
                    payment_date: payment.payment_date,
                })
                .await?;
        }

        let from = sub.status;
        let Some(target) = event.kind.target_status() else {
            if event.kind == BillingEventKind::SubscriptionPending {
                if let Some(plan) = self.resolve_plan(event.plan.as_ref(), None).await? {
                    sub.plan_id = Some(plan.id);
                }
            }
            self.repos.subscriptions.save(&sub).await?;
            debug!(%company.id, kind = %event.kind, "recorded billing event without status change");
            return Ok(ReconcileOutcome::Applied {
                company_id: company.id,
                from,
                to: from,
                credits_granted: 0,
            });
        };

        let to = match from.transition(target, Actor::Provider) {
            Ok(to) => to,
            Err(err) => {
                self.repos.subscriptions.save(&sub).await?;
                info!(%company.id, event_id = %event.event_id, %err, "billing transition rejected");
                return Ok(ReconcileOutcome::ignored(err.to_string()));
            }
        };

        let plan = self.resolve_plan(event.plan.as_ref(), sub.plan_id).await?;
        sub.status = to;
        sub.provider = Some(event.provider);
        if let Some(plan) = &plan {
            sub.plan_id = Some(plan.id);
        }
        if let Some(details) = &event.subscription {
            if let Some(cycle) = details.cycle {
                sub.cycle = cycle;
            }
            if let Some(value) = details.value_cents {
                sub.value_cents = value;
            }
        }
        if let Some(next_due) = event.next_due_date.or_else(|| {
            (event.kind == BillingEventKind::PaymentReceived)
                .then(|| event.due_date.map(|due| sub.cycle.advance(due)))
                .flatten()
        }) {
            sub.next_due_date = Some(next_due);
        }
        let sub = self.repos.subscriptions.save(&sub).await?;

        if from == to && to.is_terminal() {
            return Ok(ReconcileOutcome::Applied {
                company_id: company.id,
                from,
                to,
                credits_granted: 0,
            });
        }

        let credits_granted = self
            .apply_effects(&company, &sub, plan.as_ref(), event, from)
            .await?;

        info!(
            %company.id,
            provider = event.provider.as_str(),
            event_id = %event.event_id,
            %from,
            %to,
            credits_granted,
            "billing event reconciled"
        );

        Ok(ReconcileOutcome::Applied {
            company_id: company.id,
            from,
            to,
            credits_granted,
        })
    }

    async fn apply_effects(
        &self,
        company: &Company,
        sub: &Subscription,
        plan: Option<&Plan>,
        event: &BillingEvent,
        from: SubscriptionStatus,
    ) -> Result<i64, BillingError> {
        let provider = event.provider;
        let mut credits_granted = 0;

        match sub.status {
            SubscriptionStatus::Active => {
                let entitlements = match plan {
                    Some(plan) => plan.entitlements(),
                    None => {
                        warn!(%company.id, "active subscription without a resolvable plan; keeping limits");
                        current_entitlements(company)
                    }
                };
                self.repos
                    .companies
                    .apply_entitlements(company.id, entitlements, true)
                    .await?;

                if event.kind == BillingEventKind::PaymentReceived {
                    if let Some(plan) = plan.filter(|p| p.credits > 0) {
                        let granted = self
                            .run_once(
                                &event.ledger_key("credit_grant"),
                                provider,
                                self.repos.companies.add_credits(company.id, plan.credits),
                            )
                            .await?;
                        if granted.is_some() {
                            credits_granted = plan.credits;
                        }
                    }
                    self.notify_once(
                        &event.ledger_key("notify_payment_received"),
                        provider,
                        company.id,
                        Notice {
                            kind: NotificationKind::Success,
                            title: "Pagamento confirmado",
                            message: format!(
                                "Recebemos o pagamento da assinatura. {} créditos foram adicionados.",
                                plan.map_or(0, |p| p.credits)
                            ),
                        },
                    )
                    .await?;
                } else if from != SubscriptionStatus::Active {
                    self.notify_once(
                        &event.ledger_key("notify_active"),
                        provider,
                        company.id,
                        Notice {
                            kind: NotificationKind::Success,
                            title: "Assinatura ativa",
                            message: format!("Seu plano {} está ativo.", entitlements.plan.as_str()),
                        },
                    )
                    .await?;
                }
            }
            SubscriptionStatus::Overdue => {
                self.notify_once(
                    &event.ledger_key("notify_overdue"),
                    provider,
                    company.id,
                    overdue_notice(),
                )
                .await?;
            }
            SubscriptionStatus::Canceled | SubscriptionStatus::Expired => {
                self.downgrade(company.id).await?;
                self.notify_once(
                    &event.ledger_key("notify_ended"),
                    provider,
                    company.id,
                    ended_notice(sub.status),
                )
                .await?;
            }
            SubscriptionStatus::Pending => {}
        }

        Ok(credits_granted)
    }

    async fn resolve_company(&self, refs: &[CompanyRef]) -> Result<Option<Company>, BillingError> {
        for r in refs {
            let found = match r {
                CompanyRef::Id(id) => self.repos.companies.find_company(*id).await?,
                CompanyRef::StripeCustomer(c) => {
                    self.repos.companies.find_company_by_stripe_customer(c).await?
                }
                CompanyRef::AsaasCustomer(c) => {
                    self.repos.companies.find_company_by_asaas_customer(c).await?
                }
                CompanyRef::StripeSubscription(s) => {
                    match self.repos.subscriptions.find_by_stripe_subscription(s).await? {
                        Some(sub) => self.repos.companies.find_company(sub.company_id).await?,
                        None => None,
                    }
                }
                CompanyRef::AsaasSubscription(s) => {
                    match self.repos.subscriptions.find_by_asaas_subscription(s).await? {
                        Some(sub) => self.repos.companies.find_company(sub.company_id).await?,
                        None => None,
                    }
                }
            };
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    async fn resolve_plan(
        &self,
        plan_ref: Option<&PlanRef>,
        fallback: Option<Uuid>,
    ) -> Result<Option<Plan>, BillingError> {
        let from_event = match plan_ref {
            Some(PlanRef::Id(id)) => self.repos.plans.find_plan_by_id(*id).await?,
            Some(PlanRef::Code(code)) => self.repos.plans.find_plan_by_code(*code).await?,
            Some(PlanRef::StripePrice(price)) => {
                self.repos.plans.find_plan_by_stripe_price(price).await?
            }
            None => None,
        };
        match (from_event, fallback) {
            (Some(plan), _) => Ok(Some(plan)),
            (None, Some(id)) => Ok(self.repos.plans.find_plan_by_id(id).await?),
            (None, None) => Ok(None),
        }
    }

    async fn link_provider_ids(
        &self,
        company: &Company,
        sub: &mut Subscription,
        event: &BillingEvent,
    ) -> Result<(), BillingError> {
        if let Some(customer) = &event.customer_id {
            match event.provider {
                BillingProvider::Stripe if company.stripe_customer_id.is_none() => {
                    self.repos
                        .companies
                        .set_stripe_customer_id(company.id, customer)
                        .await?;
                }
                BillingProvider::Asaas if company.asaas_customer_id.is_none() => {
                    self.repos
                        .companies
                        .set_asaas_customer_id(company.id, customer)
                        .await?;
                }
                _ => {}
            }
        }
        if let Some(details) = &event.subscription {
            let slot = match event.provider {
                BillingProvider::Stripe => &mut sub.stripe_subscription_id,
                BillingProvider::Asaas => &mut sub.asaas_subscription_id,
            };
            *slot = Some(details.external_id.clone());
        }
        Ok(())
    }

    /// Runs `effect` unless the ledger already holds `key`; releases the key if it fails.
    async fn run_once<T, Fut>(
        &self,
        key: &str,
        provider: BillingProvider,
        effect: Fut,
    ) -> Result<Option<T>, BillingError>
    where
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        if !self.repos.ledger.try_claim(key, provider).await? {
            debug!(key, "billing effect already applied");
            return Ok(None);
        }
        match effect.await {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                if let Err(release_err) = self.repos.ledger.release(key).await {
                    warn!(key, ?release_err, "failed to release ledger key");
                }
                Err(err.into())
            }
        }
    }

    async fn notify_once(
        &self,
        key: &str,
        provider: BillingProvider,
        company_id: Uuid,
        notice: Notice,
    ) -> Result<(), BillingError> {
        self.run_once(key, provider, self.notify_admins(company_id, notice))
            .await?;
        Ok(())
    }

    /// One notification per company ADMIN; returns how many were created.
    async fn notify_admins(&self, company_id: Uuid, notice: Notice) -> Result<usize, sqlx::Error> {
        let admins = self.repos.users.list_company_admins(company_id).await?;
        for admin in &admins {
            self.repos
                .notifications
                .create_notification(&NewNotification {
                    user_id: admin.id,
                    company_id,
                    kind: notice.kind,
                    title: notice.title.to_string(),
                    message: notice.message.clone(),
                })
                .await?;
        }
        Ok(admins.len())
    }

    /// Unified policy for both providers: STARTER limits, credits kept, trial untouched.
    pub(super) async fn downgrade(&self, company_id: Uuid) -> Result<(), BillingError> {
        let starter = self
            .repos
            .plans
            .find_plan_by_code(PlanCode::Starter)
            .await?
            .map(|p| p.entitlements())
            .unwrap_or(Entitlements::STARTER_FALLBACK);
        self.repos
            .companies
            .apply_entitlements(company_id, starter, false)
            .await?;
        Ok(())
    }

    pub(super) async fn notify_overdue(&self, company_id: Uuid) -> Result<(), BillingError> {
        self.notify_admins(company_id, overdue_notice()).await?;
        Ok(())
    }

    pub(super) async fn notify_ended(
        &self,
        company_id: Uuid,
        status: SubscriptionStatus,
    ) -> Result<(), BillingError> {
        self.notify_admins(company_id, ended_notice(status)).await?;
        Ok(())
    }

    /// Operator override: puts the company on `code` with an ACTIVE subscription.
    pub async fn admin_set_plan(
        &self,
        company_id: Uuid,
        code: PlanCode,
        extra_credits: i64,
    ) -> Result<Subscription, BillingError> {
        let company = self
            .repos
            .companies
            .find_company(company_id)
            .await?
            .ok_or(BillingError::CompanyNotFound(company_id))?;
        let plan = self
            .repos
            .plans
            .find_plan_by_code(code)
            .await?
            .ok_or_else(|| BillingError::PlanNotFound(code.as_str().to_string()))?;

        let mut sub = self
            .repos
            .subscriptions
            .get_or_create(&NewSubscription::pending(company.id, None))
            .await?;
        let from = sub.status;
        sub.status = from.transition(SubscriptionStatus::Active, Actor::Admin)?;
        sub.plan_id = Some(plan.id);
        sub.value_cents = plan.price_cents(sub.cycle);
        // The period restarts today; the old due date may already be past.
        sub.next_due_date = Some(sub.cycle.advance(OffsetDateTime::now_utc().date()));
        let sub = self.repos.subscriptions.save(&sub).await?;

        self.repos
            .companies
            .apply_entitlements(company.id, plan.entitlements(), true)
            .await?;
        if extra_credits > 0 {
            self.repos
                .companies
                .add_credits(company.id, extra_credits)
                .await?;
        }
        self.notify_admins(
            company.id,
            Notice {
                kind: NotificationKind::Success,
                title: "Plano atualizado",
                message: format!("Sua empresa agora está no plano {}.", plan.name),
            },
        )
        .await?;

        info!(%company.id, plan = code.as_str(), %from, extra_credits, "admin set company plan");
        Ok(sub)
    }

    /// Operator cancel: CANCELED plus the standard downgrade.
    pub async fn admin_cancel(&self, company_id: Uuid) -> Result<Subscription, BillingError> {
        let mut sub = self
            .repos
            .subscriptions
            .find_by_company(company_id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound(company_id))?;
        let from = sub.status;
        sub.status = from.transition(SubscriptionStatus::Canceled, Actor::Admin)?;
        let sub = self.repos.subscriptions.save(&sub).await?;

        self.downgrade(company_id).await?;
        self.notify_ended(company_id, SubscriptionStatus::Canceled)
            .await?;

        info!(%company_id, %from, "admin canceled subscription");
        Ok(sub)
    }

    /// Puts the company's subscription into PENDING for a new checkout.
    pub async fn prepare_checkout(
        &self,
        company_id: Uuid,
        provider: BillingProvider,
        plan: &Plan,
        cycle: BillingCycle,
        external_subscription_id: Option<String>,
    ) -> Result<Subscription, BillingError> {
        let mut sub = self
            .repos
            .subscriptions
            .get_or_create(&NewSubscription {
                company_id,
                plan_id: Some(plan.id),
                provider: Some(provider),
                value_cents: plan.price_cents(cycle),
                cycle,
            })
            .await?;
        if matches!(
            sub.status,
            SubscriptionStatus::Active | SubscriptionStatus::Overdue
        ) {
            return Err(BillingError::AlreadySubscribed);
        }

        sub.status = sub
            .status
            .transition(SubscriptionStatus::Pending, Actor::Checkout)?;
        sub.plan_id = Some(plan.id);
        sub.provider = Some(provider);
        sub.value_cents = plan.price_cents(cycle);
        sub.cycle = cycle;
        sub.next_due_date = None;
        if let Some(external) = external_subscription_id {
            match provider {
                BillingProvider::Stripe => sub.stripe_subscription_id = Some(external),
                BillingProvider::Asaas => sub.asaas_subscription_id = Some(external),
            }
        }
        Ok(self.repos.subscriptions.save(&sub).await?)
    }
}

fn current_entitlements(company: &Company) -> Entitlements {
    Entitlements {
        plan: company.plan,
        max_users: company.max_users,
        max_executions: company.max_executions,
    }
}

fn overdue_notice() -> Notice {
    Notice {
        kind: NotificationKind::Warning,
        title: "Pagamento em atraso",
        message: "Não identificamos o pagamento da sua assinatura. Regularize para evitar o bloqueio."
            .to_string(),
    }
}

fn ended_notice(status: SubscriptionStatus) -> Notice {
    match status {
        SubscriptionStatus::Expired => Notice {
            kind: NotificationKind::Error,
            title: "Assinatura expirada",
            message: "Sua assinatura expirou e a empresa voltou ao plano Starter.".to_string(),
        },
        _ => Notice {
            kind: NotificationKind::Warning,
            title: "Assinatura cancelada",
            message: "Sua assinatura foi cancelada e a empresa voltou ao plano Starter.".to_string(),
        },
    }
}
