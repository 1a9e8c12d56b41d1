//! Stripe payment gateway client.
//!
//! Talks to the `PaymentIntents` API directly over HTTPS with form-encoded
//! bodies. Intents are created with `capture_method=manual`: the card is
//! authorized when the buyer confirms in the browser, and captured only
//! inside order materialization.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::StripeConfig;

use super::{CreatedIntent, IntentStatus, PaymentError, PaymentGateway, PaymentIntent};

/// Stripe API base URL.
const BASE_URL: &str = "https://api.stripe.com/v1";

/// Hard timeout for any single Stripe call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Stripe-backed implementation of [`PaymentGateway`].
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: secrecy::SecretString,
}

impl StripeGateway {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
        })
    }

    async fn send_form(
        &self,
        method: reqwest::Method,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<IntentResponse, PaymentError> {
        let url = format!("{BASE_URL}/{path}");
        let response = self
            .client
            .request(method, &url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<CreatedIntent, PaymentError> {
        let form = [
            ("amount", amount.to_string()),
            ("currency", currency.to_string()),
            ("capture_method", "manual".to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let intent = self
            .send_form(reqwest::Method::POST, "payment_intents", &form)
            .await?;

        let client_secret = intent
            .client_secret
            .ok_or_else(|| PaymentError::Parse("intent missing client_secret".to_string()))?;

        Ok(CreatedIntent {
            id: intent.id,
            client_secret,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let url = format!("{BASE_URL}/payment_intents/{intent_id}");
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let intent: IntentResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        Ok(intent.into_payment_intent())
    }

    async fn capture_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let path = format!("payment_intents/{intent_id}/capture");
        let intent = self.send_form(reqwest::Method::POST, &path, &[]).await?;
        Ok(intent.into_payment_intent())
    }
}

/// Subset of Stripe's `PaymentIntent` resource that checkout needs.
#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    status: IntentStatus,
    amount: i64,
    client_secret: Option<String>,
}

impl IntentResponse {
    fn into_payment_intent(self) -> PaymentIntent {
        PaymentIntent {
            id: self.id,
            status: self.status,
            amount: self.amount,
        }
    }
}
