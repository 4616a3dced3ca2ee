use crate::models::subscription::SubscriptionStatus;

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// Verified provider webhook or a live provider lookup.
    Provider,
    /// Time-driven expiry sweep.
    Scheduler,
    /// Platform operator.
    Admin,
    /// A company starting a new checkout.
    Checkout,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{actor:?} cannot move subscription from {from} to {to}")]
pub struct TransitionError {
    pub from: SubscriptionStatus,
    pub to: SubscriptionStatus,
    pub actor: Actor,
}

impl SubscriptionStatus {
    pub fn can_transition(self, next: SubscriptionStatus, actor: Actor) -> bool {
        use SubscriptionStatus::*;

        match actor {
            Actor::Provider => match self {
                Pending | Active | Overdue => next != Pending || self == Pending,
                // Late provider events never resurrect a finished subscription.
                Canceled | Expired => next == self,
            },
            Actor::Scheduler => matches!((self, next), (Active, Overdue) | (Overdue, Expired)),
            Actor::Admin => match next {
                Active => true,
                Canceled => matches!(self, Pending | Active | Overdue),
                _ => false,
            },
            Actor::Checkout => next == Pending && matches!(self, Pending | Canceled | Expired),
        }
    }

    pub fn transition(
        self,
        next: SubscriptionStatus,
        actor: Actor,
    ) -> Result<SubscriptionStatus, TransitionError> {
        if self.can_transition(next, actor) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
                actor,
            })
        }
    }
}
