use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::{AsaasSettings, StripeSettings};
use crate::db::settings_repository::SettingsRepository;
use crate::utils::encryption::{decrypt_secret, encrypt_secret, mask_secret, EncryptionError};

pub const STRIPE_SECRET_KEY: &str = "stripe_secret_key";
pub const STRIPE_WEBHOOK_SECRET: &str = "stripe_webhook_secret";
pub const ASAAS_API_KEY: &str = "asaas_api_key";
pub const ASAAS_WEBHOOK_TOKEN: &str = "asaas_webhook_token";
pub const ALLOW_TRIAL_WITHOUT_CARD: &str = "allow_trial_without_card";
pub const TRIAL_DAYS: &str = "trial_days";
pub const TRIAL_CREDITS: &str = "trial_credits";
pub const TOKEN_PRICING: &str = "token_pricing";

const SECRET_KEYS: [&str; 4] = [
    STRIPE_SECRET_KEY,
    STRIPE_WEBHOOK_SECRET,
    ASAAS_API_KEY,
    ASAAS_WEBHOOK_TOKEN,
];

pub const DEFAULT_TRIAL_DAYS: i64 = 14;
pub const DEFAULT_TRIAL_CREDITS: i64 = 50;
pub const MAX_TRIAL_DAYS: i64 = 3650;
pub const MAX_TRIAL_CREDITS: i64 = 1_000_000;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to decrypt setting {key}: {source}")]
    Decrypt {
        key: String,
        source: EncryptionError,
    },
    #[error("failed to encrypt setting: {0}")]
    Encrypt(EncryptionError),
    #[error("invalid value for {0}")]
    Invalid(&'static str),
}

/// Effective billing configuration: stored values first, environment second.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingSettings {
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub asaas_api_key: String,
    pub asaas_base_url: String,
    pub asaas_webhook_token: Option<String>,
    pub require_asaas_webhook_token: bool,
    pub allow_trial_without_card: bool,
    pub trial_days: i64,
    pub trial_credits: i64,
    pub token_pricing: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedSettings {
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub asaas_api_key: Option<String>,
    pub asaas_webhook_token: Option<String>,
    pub allow_trial_without_card: bool,
    pub trial_days: i64,
    pub trial_credits: i64,
    pub token_pricing: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub asaas_api_key: Option<String>,
    pub asaas_webhook_token: Option<String>,
    pub allow_trial_without_card: Option<bool>,
    pub trial_days: Option<i64>,
    pub trial_credits: Option<i64>,
    pub token_pricing: Option<Value>,
}

impl SettingsUpdate {
    /// Whether any provider credential changes, which requires rebuilding cached clients.
    pub fn touches_credentials(&self) -> bool {
        self.stripe_secret_key.is_some()
            || self.asaas_api_key.is_some()
    }
}

pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
    encryption_key: Option<Vec<u8>>,
    stripe_env: StripeSettings,
    asaas_env: AsaasSettings,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl SettingsService {
    pub fn new(
        repo: Arc<dyn SettingsRepository>,
        encryption_key: Option<Vec<u8>>,
        stripe_env: StripeSettings,
        asaas_env: AsaasSettings,
    ) -> Self {
        Self {
            repo,
            encryption_key,
            stripe_env,
            asaas_env,
        }
    }

    async fn stored_values(&self) -> Result<HashMap<String, String>, SettingsError> {
        let mut values = HashMap::new();
        for setting in self.repo.list_settings().await? {
            let value = if setting.encrypted {
                let key = self.encryption_key.as_deref().ok_or_else(|| SettingsError::Decrypt {
                    key: setting.key.clone(),
                    source: EncryptionError::MissingKey,
                })?;
                decrypt_secret(key, &setting.value).map_err(|source| SettingsError::Decrypt {
                    key: setting.key.clone(),
                    source,
                })?
            } else {
                setting.value
            };
            values.insert(setting.key, value);
        }
        Ok(values)
    }

    pub async fn load(&self) -> Result<BillingSettings, SettingsError> {
        let mut stored = self.stored_values().await?;
        let mut take = |key: &str| non_empty(stored.remove(key));

        let stripe_secret_key =
            take(STRIPE_SECRET_KEY).unwrap_or_else(|| self.stripe_env.secret_key.clone());
        let stripe_webhook_secret =
            take(STRIPE_WEBHOOK_SECRET).unwrap_or_else(|| self.stripe_env.webhook_secret.clone());
        let asaas_api_key = take(ASAAS_API_KEY).unwrap_or_else(|| self.asaas_env.api_key.clone());
        let asaas_webhook_token =
            take(ASAAS_WEBHOOK_TOKEN).or_else(|| self.asaas_env.webhook_token.clone());

        let allow_trial_without_card = take(ALLOW_TRIAL_WITHOUT_CARD)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);
        let trial_days = take(TRIAL_DAYS)
            .and_then(|v| v.parse::<i64>().ok())
            .map(|d| d.clamp(0, MAX_TRIAL_DAYS))
            .unwrap_or(DEFAULT_TRIAL_DAYS);
        let trial_credits = take(TRIAL_CREDITS)
            .and_then(|v| v.parse::<i64>().ok())
            .map(|c| c.clamp(0, MAX_TRIAL_CREDITS))
            .unwrap_or(DEFAULT_TRIAL_CREDITS);
        let token_pricing = take(TOKEN_PRICING)
            .and_then(|v| serde_json::from_str::<Value>(&v).ok())
            .unwrap_or_else(|| Value::Object(Default::default()));

        Ok(BillingSettings {
            stripe_secret_key,
            stripe_webhook_secret,
            asaas_api_key,
            asaas_base_url: self.asaas_env.base_url.clone(),
            asaas_webhook_token,
            require_asaas_webhook_token: self.asaas_env.require_webhook_token,
            allow_trial_without_card,
            trial_days,
            trial_credits,
            token_pricing,
        })
    }

    pub async fn masked(&self) -> Result<MaskedSettings, SettingsError> {
        let settings = self.load().await?;
        let mask = |v: &str| (!v.is_empty()).then(|| mask_secret(v));
        Ok(MaskedSettings {
            stripe_secret_key: mask(&settings.stripe_secret_key),
            stripe_webhook_secret: mask(&settings.stripe_webhook_secret),
            asaas_api_key: mask(&settings.asaas_api_key),
            asaas_webhook_token: settings.asaas_webhook_token.as_deref().and_then(mask),
            allow_trial_without_card: settings.allow_trial_without_card,
            trial_days: settings.trial_days,
            trial_credits: settings.trial_credits,
            token_pricing: settings.token_pricing,
        })
    }

    async fn store(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        if SECRET_KEYS.contains(&key) {
            if let Some(enc_key) = self.encryption_key.as_deref() {
                let ciphertext = encrypt_secret(enc_key, value).map_err(SettingsError::Encrypt)?;
                self.repo.upsert_setting(key, &ciphertext, true).await?;
                return Ok(());
            }
            warn!(key, "SETTINGS_ENCRYPTION_KEY not set; storing secret setting in plaintext");
        }
        self.repo.upsert_setting(key, value, false).await?;
        Ok(())
    }

    pub async fn update(&self, update: SettingsUpdate) -> Result<(), SettingsError> {
        if update
            .trial_days
            .is_some_and(|d| !(0..=MAX_TRIAL_DAYS).contains(&d))
        {
            return Err(SettingsError::Invalid(TRIAL_DAYS));
        }
        if update
            .trial_credits
            .is_some_and(|c| !(0..=MAX_TRIAL_CREDITS).contains(&c))
        {
            return Err(SettingsError::Invalid(TRIAL_CREDITS));
        }
        if update.token_pricing.as_ref().is_some_and(|v| !v.is_object()) {
            return Err(SettingsError::Invalid(TOKEN_PRICING));
        }

        let secrets = [
            (STRIPE_SECRET_KEY, update.stripe_secret_key),
            (STRIPE_WEBHOOK_SECRET, update.stripe_webhook_secret),
            (ASAAS_API_KEY, update.asaas_api_key),
            (ASAAS_WEBHOOK_TOKEN, update.asaas_webhook_token),
        ];
        for (key, value) in secrets {
            if let Some(value) = value {
                self.store(key, value.trim()).await?;
            }
        }
        if let Some(allow) = update.allow_trial_without_card {
            self.store(ALLOW_TRIAL_WITHOUT_CARD, &allow.to_string()).await?;
        }
        if let Some(days) = update.trial_days {
            self.store(TRIAL_DAYS, &days.to_string()).await?;
        }
        if let Some(credits) = update.trial_credits {
            self.store(TRIAL_CREDITS, &credits.to_string()).await?;
        }
        if let Some(pricing) = update.token_pricing {
            self.store(TOKEN_PRICING, &pricing.to_string()).await?;
        }
        Ok(())
    }
}
