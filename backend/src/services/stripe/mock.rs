use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{
    CheckoutSession, CreateCheckoutSessionRequest, StripeEvent, StripeService,
    StripeServiceError, SubscriptionInfo,
};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

#[derive(Clone, Default)]
pub struct MockStripeService {
    pub created_customers: Arc<Mutex<Vec<(String, BTreeMap<String, String>)>>>,
    pub checkout_requests: Arc<Mutex<Vec<CreateCheckoutSessionRequest>>>,
    pub subscriptions: Arc<Mutex<Vec<SubscriptionInfo>>>,
    pub fail_checkout: bool,
}

impl MockStripeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscription(self, info: SubscriptionInfo) -> Self {
        self.subscriptions.lock().unwrap().push(info);
        self
    }
}

fn make_id(prefix: &str) -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{}_{}", prefix, ts)
}

fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Builds a `Stripe-Signature` header the way Stripe signs deliveries.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    format!("t={},v1={}", timestamp, sign(secret, timestamp, payload))
}

#[async_trait]
impl StripeService for MockStripeService {
    async fn create_customer(
        &self,
        email: &str,
        _name: Option<&str>,
        metadata: BTreeMap<String, String>,
    ) -> Result<String, StripeServiceError> {
        self.created_customers
            .lock()
            .unwrap()
            .push((email.to_string(), metadata));
        Ok(make_id("cus_test"))
    }

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        if self.fail_checkout {
            return Err(StripeServiceError::Api("card_declined".into()));
        }
        self.checkout_requests.lock().unwrap().push(req);
        Ok(CheckoutSession {
            id: make_id("cs_test"),
            url: Some("https://example.test/checkout".into()),
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionInfo, StripeServiceError> {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == subscription_id)
            .cloned()
            .ok_or_else(|| {
                StripeServiceError::NotFound(format!("subscription {} not found", subscription_id))
            })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
        webhook_secret: &str,
    ) -> Result<StripeEvent, StripeServiceError> {
        if webhook_secret.trim().is_empty() {
            return Err(StripeServiceError::Config(
                "stripe webhook secret is not configured".into(),
            ));
        }
        let mut timestamp = None;
        let mut candidates = Vec::new();
        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
                Some(("v1", v)) => candidates.push(v),
                _ => {}
            }
        }
        let timestamp =
            timestamp.ok_or_else(|| StripeServiceError::Webhook("bad header".into()))?;
        let expected = sign(webhook_secret, timestamp, payload);
        if !candidates.iter().any(|c| *c == expected) {
            return Err(StripeServiceError::Webhook("bad signature".into()));
        }

        let val: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        Ok(StripeEvent {
            id: val["id"].as_str().unwrap_or_default().to_string(),
            r#type: val["type"].as_str().unwrap_or("unknown").to_string(),
            payload: val,
        })
    }
}
