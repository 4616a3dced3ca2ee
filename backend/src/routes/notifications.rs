use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::responses::JsonResponse;
use crate::routes::auth::{load_user, session::AuthSession};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

// GET /api/notifications
pub async fn list_notifications(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Query(query): Query<ListQuery>,
) -> Response {
    let user = match load_user(&app_state, &claims).await {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    match app_state.notifications.list_for_user(user.id, limit).await {
        Ok(items) => {
            let unread = items.iter().filter(|n| !n.read).count();
            Json(json!({ "success": true, "notifications": items, "unread": unread }))
                .into_response()
        }
        Err(err) => {
            error!(?err, user_id = %user.id, "failed to list notifications");
            JsonResponse::server_error("Failed to load notifications").into_response()
        }
    }
}

// POST /api/notifications/{id}/read
pub async fn mark_read(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(notification_id): Path<Uuid>,
) -> Response {
    let user = match load_user(&app_state, &claims).await {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match app_state
        .notifications
        .mark_read(user.id, notification_id)
        .await
    {
        Ok(true) => JsonResponse::success("Notification marked as read").into_response(),
        Ok(false) => JsonResponse::not_found("Notification not found").into_response(),
        Err(err) => {
            error!(?err, %notification_id, "failed to mark notification read");
            JsonResponse::server_error("Failed to update notification").into_response()
        }
    }
}

// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let user = match load_user(&app_state, &claims).await {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match app_state.notifications.mark_all_read(user.id).await {
        Ok(updated) => Json(json!({ "success": true, "updated": updated })).into_response(),
        Err(err) => {
            error!(?err, user_id = %user.id, "failed to mark notifications read");
            JsonResponse::server_error("Failed to update notifications").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::to_bytes, http::StatusCode};

    use super::*;
    use crate::db::mock_db::{sample_user, MockDb};
    use crate::db::notification_repository::NotificationRepository;
    use crate::models::notification::{NewNotification, NotificationKind};
    use crate::models::user::UserRole;
    use crate::state::test_support::{claims_for, test_state};

    #[tokio::test]
    async fn users_only_see_and_mark_their_own() {
        let ctx = test_state(MockDb::default());
        let company_id = Uuid::new_v4();
        let me = sample_user(Some(company_id), UserRole::Admin);
        let other = sample_user(Some(company_id), UserRole::Admin);
        ctx.db.insert_user(me.clone());
        ctx.db.insert_user(other.clone());

        let mut ids = Vec::new();
        for (user, title) in [(&me, "primeira"), (&other, "alheia"), (&me, "segunda")] {
            let n = ctx
                .db
                .create_notification(&NewNotification {
                    user_id: user.id,
                    company_id,
                    kind: NotificationKind::Info,
                    title: title.into(),
                    message: String::new(),
                })
                .await
                .unwrap();
            ids.push(n.id);
        }

        let res = list_notifications(
            State(ctx.state.clone()),
            AuthSession(claims_for(&me)),
            Query(ListQuery::default()),
        )
        .await;
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let titles: Vec<&str> = json["notifications"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["segunda", "primeira"]);
        assert_eq!(json["unread"], 2);

        let foreign = mark_read(
            State(ctx.state.clone()),
            AuthSession(claims_for(&me)),
            Path(ids[1]),
        )
        .await;
        assert_eq!(foreign.status(), StatusCode::NOT_FOUND);

        let own = mark_read(
            State(ctx.state.clone()),
            AuthSession(claims_for(&me)),
            Path(ids[0]),
        )
        .await;
        assert_eq!(own.status(), StatusCode::OK);

        let all = mark_all_read(State(ctx.state.clone()), AuthSession(claims_for(&me))).await;
        let bytes = to_bytes(all.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["updated"], 1);
        assert!(!ctx.db.notifications.lock().unwrap()[1].read);
    }
}
