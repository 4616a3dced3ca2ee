//! Token validation and role guards. Tokens are minted elsewhere; handlers
//! only ever see [`session::AuthSession`].

pub mod claims;
pub mod session;

use axum::response::{IntoResponse, Response};
use tracing::error;
use uuid::Uuid;

use crate::models::user::{User, UserRole};
use crate::responses::JsonResponse;
use crate::state::AppState;
use claims::Claims;

/// A user bound to a company. The user row is reloaded so role and company
/// changes apply before the token expires.
#[derive(Debug, Clone)]
pub struct Member {
    pub user: User,
    pub company_id: Uuid,
}

pub async fn load_user(state: &AppState, claims: &Claims) -> Result<User, Response> {
    let Some(user_id) = claims.user_id() else {
        return Err(JsonResponse::unauthorized("Invalid session").into_response());
    };
    match state.users.find_user_by_id(user_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(JsonResponse::unauthorized("Invalid session").into_response()),
        Err(err) => {
            error!(?err, %user_id, "failed to load session user");
            Err(JsonResponse::server_error("Failed to load user").into_response())
        }
    }
}

pub async fn require_member(state: &AppState, claims: &Claims) -> Result<Member, Response> {
    let user = load_user(state, claims).await?;
    match user.company_id {
        Some(company_id) => Ok(Member { user, company_id }),
        None => Err(JsonResponse::forbidden_with_code(
            "User is not linked to a company",
            "NO_COMPANY",
        )
        .into_response()),
    }
}

pub async fn require_company_admin(state: &AppState, claims: &Claims) -> Result<Member, Response> {
    let member = require_member(state, claims).await?;
    if member.user.role != UserRole::Admin {
        return Err(JsonResponse::forbidden("Company admin only").into_response());
    }
    Ok(member)
}

pub async fn require_super_admin(state: &AppState, claims: &Claims) -> Result<User, Response> {
    let user = load_user(state, claims).await?;
    if user.role != UserRole::SuperAdmin {
        return Err(JsonResponse::forbidden("Admin only").into_response());
    }
    Ok(user)
}
