use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::{
    cents_to_decimal, AsaasService, AsaasServiceError, AsaasSubscription, NewAsaasCustomer,
    NewAsaasSubscription,
};
use crate::utils::dates::format_iso_date;

pub struct LiveAsaasService {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct AsaasErrorBody {
    #[serde(default)]
    errors: Vec<AsaasErrorItem>,
}

#[derive(Debug, Deserialize)]
struct AsaasErrorItem {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AsaasIdResponse {
    id: String,
}

impl LiveAsaasService {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        self.client
            .request(method, url)
            .header("access_token", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, AsaasServiceError> {
        if self.api_key.trim().is_empty() {
            return Err(AsaasServiceError::Config("Asaas API key is not configured".into()));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<AsaasErrorBody>(&body)
                .ok()
                .and_then(|parsed| {
                    let joined = parsed
                        .errors
                        .into_iter()
                        .filter_map(|e| e.description)
                        .collect::<Vec<_>>()
                        .join("; ");
                    (!joined.is_empty()).then_some(joined)
                })
                .unwrap_or_else(|| body.trim().to_string());
            return Err(AsaasServiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str::<T>(&body)
            .map_err(|err| AsaasServiceError::InvalidResponse(err.to_string()))
    }
}

#[async_trait]
impl AsaasService for LiveAsaasService {
    async fn create_customer(
        &self,
        customer: &NewAsaasCustomer,
    ) -> Result<String, AsaasServiceError> {
        let payload = json!({
            "name": customer.name,
            "email": customer.email,
            "cpfCnpj": customer.cpf_cnpj,
            "externalReference": customer.external_reference,
        });
        let created: AsaasIdResponse = self
            .send(self.request(Method::POST, "/customers").json(&payload))
            .await?;
        Ok(created.id)
    }

    async fn create_subscription(
        &self,
        subscription: &NewAsaasSubscription,
    ) -> Result<AsaasSubscription, AsaasServiceError> {
        let payload = json!({
            "customer": subscription.customer,
            "billingType": subscription.billing_type,
            "value": cents_to_decimal(subscription.value_cents),
            "nextDueDate": format_iso_date(subscription.next_due_date),
            "cycle": subscription.cycle.as_str(),
            "description": subscription.description,
            "externalReference": subscription.external_reference,
        });
        self.send(self.request(Method::POST, "/subscriptions").json(&payload))
            .await
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<AsaasSubscription, AsaasServiceError> {
        let path = format!("/subscriptions/{}", subscription_id);
        self.send(self.request(Method::GET, &path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::subscription::BillingCycle;
    use crate::services::asaas::AsaasBillingType;
    use time::macros::date;

    #[tokio::test]
    async fn create_subscription_sends_decimal_value_and_token_header() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST)
                    .path("/subscriptions")
                    .header("access_token", "asaas-key")
                    .json_body(json!({
                        "customer": "cus_000001",
                        "billingType": "PIX",
                        "value": 297.0,
                        "nextDueDate": "2026-11-01",
                        "cycle": "MONTHLY",
                        "description": "Plano Professional",
                        "externalReference": "company-1"
                    }));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(
                        json!({
                            "id": "sub_abc",
                            "status": "ACTIVE",
                            "nextDueDate": "2026-11-01",
                            "customer": "cus_000001"
                        })
                        .to_string(),
                    );
            })
            .await;

        let service = LiveAsaasService::new(Client::new(), server.url(""), "asaas-key");
        let created = service
            .create_subscription(&NewAsaasSubscription {
                customer: "cus_000001".into(),
                billing_type: AsaasBillingType::Pix,
                value_cents: 29_700,
                next_due_date: date!(2026 - 11 - 01),
                cycle: BillingCycle::Monthly,
                description: "Plano Professional".into(),
                external_reference: "company-1".into(),
            })
            .await
            .expect("subscription");

        mock.assert_async().await;
        assert_eq!(created.id, "sub_abc");
        assert_eq!(created.status.as_deref(), Some("ACTIVE"));
    }

    #[tokio::test]
    async fn api_errors_surface_descriptions() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST).path("/customers");
                then.status(400)
                    .header("content-type", "application/json")
                    .body(
                        json!({
                            "errors": [
                                { "code": "invalid_cpfCnpj", "description": "CPF/CNPJ inválido" }
                            ]
                        })
                        .to_string(),
                    );
            })
            .await;

        let service = LiveAsaasService::new(Client::new(), server.url(""), "asaas-key");
        let result = service
            .create_customer(&NewAsaasCustomer {
                name: "Empresa".into(),
                email: None,
                cpf_cnpj: Some("000".into()),
                external_reference: "company-1".into(),
            })
            .await;

        mock.assert_async().await;
        match result {
            Err(AsaasServiceError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "CPF/CNPJ inválido");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_api_key_is_a_config_error() {
        let service = LiveAsaasService::new(Client::new(), "http://127.0.0.1:9", "");
        let result = service.get_subscription("sub_1").await;
        assert!(matches!(result, Err(AsaasServiceError::Config(_))));
    }
}
