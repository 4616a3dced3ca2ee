use std::collections::{BTreeMap, HashMap};

use super::{
    CheckoutSession, CreateCheckoutSessionRequest, StripeEvent, StripeService,
    StripeServiceError, SubscriptionInfo,
};
use async_trait::async_trait;

pub struct LiveStripeService {
    client: stripe::Client,
}

impl LiveStripeService {
    pub fn new(secret_key: impl Into<String>) -> Self {
        let client = stripe::Client::new(secret_key);
        Self { client }
    }
}

fn to_metadata(meta: &BTreeMap<String, String>) -> HashMap<String, String> {
    meta.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

#[async_trait]
impl StripeService for LiveStripeService {
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        metadata: BTreeMap<String, String>,
    ) -> Result<String, StripeServiceError> {
        let mut params = stripe::CreateCustomer::new();
        params.email = Some(email);
        if let Some(name) = name {
            params.name = Some(name);
        }
        if !metadata.is_empty() {
            params.metadata = Some(to_metadata(&metadata));
        }
        let customer = stripe::Customer::create(&self.client, params).await?;
        Ok(customer.id.to_string())
    }

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        let customer = req
            .customer
            .parse::<stripe::CustomerId>()
            .map_err(|e| StripeServiceError::Other(e.to_string()))?;

        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(stripe::CheckoutSessionMode::Subscription);
        params.success_url = Some(&req.success_url);
        params.cancel_url = Some(&req.cancel_url);
        params.customer = Some(customer);
        if let Some(ref id) = req.client_reference_id {
            params.client_reference_id = Some(id);
        }
        params.line_items = Some(vec![stripe::CreateCheckoutSessionLineItems {
            price: Some(req.price_id.clone()),
            quantity: Some(1),
            ..Default::default()
        }]);
        if !req.metadata.is_empty() {
            params.metadata = Some(to_metadata(&req.metadata));
            params.subscription_data = Some(stripe::CreateCheckoutSessionSubscriptionData {
                metadata: Some(to_metadata(&req.metadata)),
                ..Default::default()
            });
        }

        let session = stripe::CheckoutSession::create(&self.client, params).await?;
        Ok(CheckoutSession {
            id: session.id.to_string(),
            url: session.url.clone(),
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionInfo, StripeServiceError> {
        let sub_id = subscription_id
            .parse::<stripe::SubscriptionId>()
            .map_err(|e| StripeServiceError::Other(e.to_string()))?;
        let sub = stripe::Subscription::retrieve(&self.client, &sub_id, &[]).await?;

        let price_id = sub
            .items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.to_string());

        Ok(SubscriptionInfo {
            id: sub.id.to_string(),
            status: sub.status.to_string(),
            customer: Some(sub.customer.id().to_string()),
            current_period_end: sub.current_period_end,
            price_id,
            metadata: sub.metadata.into_iter().collect(),
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
        let payload_str =
            std::str::from_utf8(payload).map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        let event =
            stripe::Webhook::construct_event(payload_str, signature_header, webhook_secret)?;
        let payload =
            serde_json::to_value(&event).map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        Ok(StripeEvent {
            id: event.id.to_string(),
            r#type: event.type_.to_string(),
            payload,
        })
    }
}
