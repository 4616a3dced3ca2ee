use std::env;
use std::net::SocketAddr;

use crate::utils::encryption::{decode_key, EncryptionError};

pub const DEFAULT_ASAAS_BASE_URL: &str = "https://sandbox.asaas.com/api/v3";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("SETTINGS_ENCRYPTION_KEY is invalid: {0}")]
    EncryptionKey(#[from] EncryptionError),
}

/// Environment fallbacks for Stripe; values stored in `system_settings` take precedence.
#[derive(Clone, Default)]
pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Clone)]
pub struct AsaasSettings {
    pub api_key: String,
    pub base_url: String,
    pub webhook_token: Option<String>,
    /// Reject Asaas webhooks when no token is configured instead of skipping verification.
    pub require_webhook_token: bool,
}

impl Default for AsaasSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_ASAAS_BASE_URL.to_string(),
            webhook_token: None,
            require_webhook_token: false,
        }
    }
}

pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub bind_addr: SocketAddr,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub stripe: StripeSettings,
    pub asaas: AsaasSettings,
    pub settings_encryption_key: Option<Vec<u8>>,
    pub expiry_sweep_interval_secs: u64,
    pub overdue_grace_days: i64,
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn flag(name: &str) -> bool {
    optional(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok(); // Load .env file

        let database_url = required("DATABASE_URL")?;
        let frontend_origin = required("FRONTEND_ORIGIN")?;
        let bind_addr = parsed("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?;

        let settings_encryption_key = match optional("SETTINGS_ENCRYPTION_KEY") {
            Some(raw) => Some(decode_key(&raw)?),
            None => None,
        };

        Ok(Config {
            database_url,
            frontend_origin,
            bind_addr,
            jwt_issuer: optional("JWT_ISSUER").unwrap_or_else(|| "hrflow".to_string()),
            jwt_audience: optional("JWT_AUDIENCE").unwrap_or_else(|| "hrflow-app".to_string()),
            stripe: StripeSettings {
                secret_key: optional("STRIPE_SECRET_KEY").unwrap_or_default(),
                webhook_secret: optional("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            },
            asaas: AsaasSettings {
                api_key: optional("ASAAS_API_KEY").unwrap_or_default(),
                base_url: optional("ASAAS_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_ASAAS_BASE_URL.to_string()),
                webhook_token: optional("ASAAS_WEBHOOK_TOKEN"),
                require_webhook_token: flag("ASAAS_WEBHOOK_TOKEN_REQUIRED"),
            },
            settings_encryption_key,
            expiry_sweep_interval_secs: parsed("EXPIRY_SWEEP_INTERVAL_SECS", 3600)?,
            overdue_grace_days: parsed("OVERDUE_GRACE_DAYS", 30)?,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            database_url: String::new(),
            frontend_origin: "https://app.example.com".into(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_issuer: "test-issuer".into(),
            jwt_audience: "test-audience".into(),
            stripe: StripeSettings {
                secret_key: "sk_test_env".into(),
                webhook_secret: "whsec_env_secret".into(),
            },
            asaas: AsaasSettings::default(),
            settings_encryption_key: Some(vec![9u8; 32]),
            expiry_sweep_interval_secs: 0,
            overdue_grace_days: 30,
        }
    }
}
