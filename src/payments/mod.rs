use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PaymentsConfig;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payment provider rejected the session: {0}")]
    Rejected(String),
}

/// What we send the provider to open a hosted checkout page.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub tour_name: String,
    pub tour_summary: String,
    pub amount: f64,
    pub currency: String,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// The provider's session handle; `url` is where the client gets redirected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;
}

/// Talks to an external hosted-checkout endpoint over HTTP. The provider
/// returns a session id and a redirect URL; fulfillment arrives later on the
/// webhook route.
pub struct HostedCheckoutProvider {
    client: reqwest::Client,
    checkout_url: String,
}

impl HostedCheckoutProvider {
    pub fn new(config: &PaymentsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            checkout_url: config.checkout_url.clone(),
        }
    }
}

#[async_trait]
impl PaymentProvider for HostedCheckoutProvider {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .client
            .post(&self.checkout_url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Rejected(format!("{}: {}", status, body)));
        }

        Ok(response.json::<CheckoutSession>().await?)
    }
}
