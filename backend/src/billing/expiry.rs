use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tracing::{error, info};

use super::reconciler::EntitlementReconciler;
use super::state_machine::Actor;
use super::BillingError;
use crate::models::subscription::{Subscription, SubscriptionStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub checked: usize,
    pub marked_overdue: usize,
    pub expired: usize,
    pub errors: usize,
}

impl EntitlementReconciler {
    /// Moves ACTIVE subscriptions past their due date to OVERDUE, and OVERDUE
    /// ones past the grace window to EXPIRED with the STARTER downgrade.
    /// A failure on one subscription is logged and counted, not fatal.
    pub async fn check_and_update_expired_subscriptions(
        &self,
        now: OffsetDateTime,
        grace_days: i64,
    ) -> Result<SweepReport, BillingError> {
        let today = now.date();
        let mut report = SweepReport::default();

        for sub in self
            .repos
            .subscriptions
            .list_by_status(SubscriptionStatus::Active)
            .await?
        {
            report.checked += 1;
            if !sub.next_due_date.is_some_and(|due| due < today) {
                continue;
            }
            match self.sweep_one(sub, SubscriptionStatus::Overdue).await {
                Ok(()) => report.marked_overdue += 1,
                Err(err) => {
                    error!(?err, "failed to mark subscription overdue");
                    report.errors += 1;
                }
            }
        }

        let grace = Duration::days(grace_days.max(0));
        for sub in self
            .repos
            .subscriptions
            .list_by_status(SubscriptionStatus::Overdue)
            .await?
        {
            report.checked += 1;
            if !sub.next_due_date.is_some_and(|due| due + grace < today) {
                continue;
            }
            match self.sweep_one(sub, SubscriptionStatus::Expired).await {
                Ok(()) => report.expired += 1,
                Err(err) => {
                    error!(?err, "failed to expire subscription");
                    report.errors += 1;
                }
            }
        }

        info!(
            checked = report.checked,
            marked_overdue = report.marked_overdue,
            expired = report.expired,
            errors = report.errors,
            "subscription expiry sweep finished"
        );
        Ok(report)
    }

    async fn sweep_one(
        &self,
        mut sub: Subscription,
        next: SubscriptionStatus,
    ) -> Result<(), BillingError> {
        let from = sub.status;
        sub.status = from.transition(next, Actor::Scheduler)?;
        self.repos.subscriptions.save(&sub).await?;

        match next {
            SubscriptionStatus::Overdue => self.notify_overdue(sub.company_id).await?,
            _ => {
                self.downgrade(sub.company_id).await?;
                self.notify_ended(sub.company_id, next).await?;
            }
        }
        info!(company_id = %sub.company_id, %from, to = %next, "subscription status swept");
        Ok(())
    }
}
