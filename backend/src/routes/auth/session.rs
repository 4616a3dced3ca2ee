use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use crate::routes::auth::claims::Claims;
use crate::utils::jwt::{verify_session_token, SessionAuthority};

pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Debug, PartialEq)]
pub struct AuthSession(pub Claims);

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

impl<S> FromRequestParts<S> for AuthSession
where
    S: SessionAuthority + Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = match jar.get(AUTH_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => bearer_token(parts).ok_or(StatusCode::UNAUTHORIZED)?,
        };

        let claims = verify_session_token(state, &token).map_err(|err| {
            debug!(%err, "rejected session token");
            StatusCode::UNAUTHORIZED
        })?;

        Ok(AuthSession(claims))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::FromRequestParts,
        http::{header, Method, Request, StatusCode},
    };
    use axum_extra::extract::cookie::Cookie;
    use time::Duration;

    use crate::db::mock_db::sample_user;
    use crate::models::user::UserRole;
    use crate::routes::auth::session::AuthSession;
    use crate::utils::jwt::{issue_session_token, JwtKeys, SessionAuthority};

    struct TestKeys(JwtKeys);

    impl SessionAuthority for TestKeys {
        fn session_keys(&self) -> &JwtKeys {
            &self.0
        }
        fn session_issuer(&self) -> &str {
            "issuer"
        }
        fn session_audience(&self) -> &str {
            "audience"
        }
    }

    fn keys() -> TestKeys {
        TestKeys(JwtKeys::from_secret("0123456789abcdef0123456789abcdef").unwrap())
    }

    fn make_valid_jwt(keys: &TestKeys) -> String {
        let mut user = sample_user(None, UserRole::User);
        user.email = "test@example.com".into();
        issue_session_token(keys, &user, Duration::hours(1)).expect("JWT should create successfully")
    }

    #[tokio::test]
    async fn test_valid_cookie_extracted() {
        let keys = keys();
        let cookie = Cookie::new("auth_token", make_valid_jwt(&keys));

        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(header::COOKIE, cookie.to_string())
            .body(())
            .unwrap();

        let mut parts = request.into_parts().0;
        let session = AuthSession::from_request_parts(&mut parts, &keys)
            .await
            .expect("session");
        assert_eq!(session.0.email, "test@example.com");
        assert_eq!(session.0.role, UserRole::User);
        assert!(session.0.user_id().is_some());
    }

    #[tokio::test]
    async fn test_bearer_header_extracted() {
        let keys = keys();
        let request = Request::builder()
            .uri("/")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", make_valid_jwt(&keys)),
            )
            .body(())
            .unwrap();

        let mut parts = request.into_parts().0;
        assert!(AuthSession::from_request_parts(&mut parts, &keys)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_missing_token_returns_unauthorized() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .body(())
            .unwrap();

        let mut parts = request.into_parts().0;
        let result = AuthSession::from_request_parts(&mut parts, &keys()).await;

        assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_invalid_token_returns_unauthorized() {
        let cookie = Cookie::new("auth_token", "invalid.token.here");

        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(header::COOKIE, cookie.to_string())
            .body(())
            .unwrap();

        let mut parts = request.into_parts().0;
        let result = AuthSession::from_request_parts(&mut parts, &keys()).await;

        assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
    }
}
