use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    AsaasService, AsaasServiceError, AsaasSubscription, NewAsaasCustomer, NewAsaasSubscription,
};
use crate::utils::dates::format_iso_date;

#[derive(Clone, Default)]
pub struct MockAsaasService {
    pub customers: Arc<Mutex<Vec<NewAsaasCustomer>>>,
    pub subscriptions: Arc<Mutex<Vec<NewAsaasSubscription>>>,
}

impl MockAsaasService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AsaasService for MockAsaasService {
    async fn create_customer(
        &self,
        customer: &NewAsaasCustomer,
    ) -> Result<String, AsaasServiceError> {
        let mut customers = self.customers.lock().unwrap();
        customers.push(customer.clone());
        Ok(format!("cus_{:06}", customers.len()))
    }

    async fn create_subscription(
        &self,
        subscription: &NewAsaasSubscription,
    ) -> Result<AsaasSubscription, AsaasServiceError> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        subscriptions.push(subscription.clone());
        Ok(AsaasSubscription {
            id: format!("sub_{:06}", subscriptions.len()),
            status: Some("ACTIVE".into()),
            next_due_date: Some(format_iso_date(subscription.next_due_date)),
            customer: Some(subscription.customer.clone()),
        })
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<AsaasSubscription, AsaasServiceError> {
        Err(AsaasServiceError::Api {
            status: 404,
            message: format!("subscription {subscription_id} not found"),
        })
    }
}
