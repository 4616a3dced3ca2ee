pub mod admin;
pub mod asaas;
pub mod auth;
pub mod company;
pub mod executions;
pub mod notifications;
pub mod onboarding;
pub mod plans;
pub mod stripe;

use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::billing::BillingError;
use crate::responses::JsonResponse;

/// Maps reconciler errors onto the JSON envelope; storage failures stay opaque.
pub(crate) fn billing_error_response(err: BillingError) -> Response {
    match err {
        BillingError::CompanyNotFound(_) => {
            JsonResponse::not_found("Company not found").into_response()
        }
        BillingError::PlanNotFound(_) => JsonResponse::not_found("Plan not found").into_response(),
        BillingError::SubscriptionNotFound(_) => {
            JsonResponse::not_found("Subscription not found").into_response()
        }
        BillingError::AlreadySubscribed => {
            JsonResponse::conflict("Company already has an active subscription").into_response()
        }
        BillingError::Transition(err) => JsonResponse::conflict(&err.to_string()).into_response(),
        err @ (BillingError::Database(_) | BillingError::Settings(_)) => {
            error!(?err, "billing operation failed");
            JsonResponse::server_error("Internal server error").into_response()
        }
    }
}
