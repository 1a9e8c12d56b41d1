//! Payment gateway abstraction.
//!
//! Checkout only ever talks to [`PaymentGateway`]; the Stripe-backed
//! implementation lives in [`stripe`]. Intents are created with manual
//! capture so funds are only captured once the order row is about to be
//! written.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub mod stripe;

pub use stripe::StripeGateway;

/// Errors that can occur when talking to the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response.
    #[error("payment API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a provider response.
    #[error("payment response parse error: {0}")]
    Parse(String),
}

/// Lifecycle status of a payment intent, as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
    /// Any status introduced after this enum was written.
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    /// Whether the buyer's payment has been authorized or settled.
    #[must_use]
    pub const fn is_confirmed(self) -> bool {
        matches!(self, Self::Succeeded | Self::RequiresCapture)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }
}

/// A payment intent as seen by checkout.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub status: IntentStatus,
    /// Amount in minor currency units (cents).
    pub amount: i64,
}

/// A freshly created intent, including the secret the browser needs to
/// collect the payment method.
#[derive(Debug, Clone)]
pub struct CreatedIntent {
    pub id: String,
    pub client_secret: String,
}

/// Provider-agnostic payment operations used by checkout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a manual-capture intent for `amount` minor units.
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<CreatedIntent, PaymentError>;

    /// Fetch the current state of an intent.
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError>;

    /// Capture a previously authorized intent.
    async fn capture_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError>;
}
