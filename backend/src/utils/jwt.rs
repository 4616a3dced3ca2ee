use std::{collections::HashSet, env};

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::models::user::User;
use crate::routes::auth::claims::Claims;

/// Minimum acceptable size for the signing secret in bytes.
pub const MIN_JWT_SECRET_LENGTH: usize = 32;
/// Rejects secrets like "aaaa..." that pass the length check.
const MIN_UNIQUE_JWT_BYTES: usize = 8;

#[derive(Debug, Error)]
pub enum JwtSecretError {
    #[error("JWT_SECRET must be set")]
    Missing,
    #[error("JWT_SECRET must be at least {required} bytes, but {actual} bytes were provided")]
    TooShort { actual: usize, required: usize },
    #[error(
        "JWT_SECRET must contain sufficient entropy (at least {required} unique bytes); only {actual} unique bytes found"
    )]
    LowEntropy { actual: usize, required: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionTokenError {
    #[error("session expired")]
    Expired,
    #[error("session token was issued for another service")]
    ForeignToken,
    #[error("session token does not name a user")]
    MissingUser,
    #[error("session token is invalid")]
    Invalid,
    #[error("session token could not be signed")]
    Signing,
}

impl From<jsonwebtoken::errors::Error> for SessionTokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => SessionTokenError::Expired,
            ErrorKind::InvalidAudience | ErrorKind::InvalidIssuer => {
                SessionTokenError::ForeignToken
            }
            _ => SessionTokenError::Invalid,
        }
    }
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn from_env() -> Result<Self, JwtSecretError> {
        let value = env::var("JWT_SECRET").map_err(|_| JwtSecretError::Missing)?;
        Self::from_secret(value)
    }

    pub fn from_secret(secret: impl AsRef<[u8]>) -> Result<Self, JwtSecretError> {
        let bytes = secret.as_ref();
        if bytes.len() < MIN_JWT_SECRET_LENGTH {
            return Err(JwtSecretError::TooShort {
                actual: bytes.len(),
                required: MIN_JWT_SECRET_LENGTH,
            });
        }
        let unique = bytes.iter().copied().collect::<HashSet<_>>().len();
        if unique < MIN_UNIQUE_JWT_BYTES {
            return Err(JwtSecretError::LowEntropy {
                actual: unique,
                required: MIN_UNIQUE_JWT_BYTES,
            });
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        })
    }
}

/// Who signs and who may accept HRFlow session tokens.
pub trait SessionAuthority {
    fn session_keys(&self) -> &JwtKeys;
    fn session_issuer(&self) -> &str;
    fn session_audience(&self) -> &str;
}

/// Signs a session for `user`, carrying its company and role.
pub fn issue_session_token<A: SessionAuthority + ?Sized>(
    authority: &A,
    user: &User,
    ttl: Duration,
) -> Result<String, SessionTokenError> {
    let expires_at = OffsetDateTime::now_utc() + ttl;
    let claims = Claims {
        id: user.id.to_string(),
        email: user.email.clone(),
        company_id: user.company_id.map(|id| id.to_string()),
        role: user.role,
        exp: expires_at.unix_timestamp().max(0) as usize,
        iss: authority.session_issuer().to_owned(),
        aud: authority.session_audience().to_owned(),
    };
    encode(&Header::default(), &claims, &authority.session_keys().encoding)
        .map_err(|_| SessionTokenError::Signing)
}

/// Checks signature, issuer, audience and expiry with no leeway, then
/// requires the subject to be a user id.
pub fn verify_session_token<A: SessionAuthority + ?Sized>(
    authority: &A,
    token: &str,
) -> Result<Claims, SessionTokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[authority.session_audience()]);
    validation.set_issuer(&[authority.session_issuer()]);
    validation.set_required_spec_claims(&["exp", "iss", "aud"]);
    validation.leeway = 0;

    let claims = decode::<Claims>(token, &authority.session_keys().decoding, &validation)?.claims;
    if claims.user_id().is_none() {
        return Err(SessionTokenError::MissingUser);
    }
    Ok(claims)
}
