//! Checkout session state bridging the multi-step checkout flow.

use serde::{Deserialize, Serialize};

use petfun_core::{Email, PaymentMethod};

/// Shipping address captured at the payment step and snapshotted onto the
/// order. Plain fields, not a foreign key: it must survive account deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub floor: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Short-lived checkout state kept in the browsing session.
///
/// Created at the payment step, consumed and cleared at the confirm step
/// (success or final failure). Confirming removes the whole state from the
/// session before materializing, so a duplicate submit finds nothing to
/// confirm; even a replay that somehow kept the state hits the emptied cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutState {
    pub contact_email: Email,
    pub shipping: ShippingAddress,
    pub payment_method: PaymentMethod,
    /// External payment-intent handle, present when a gateway is configured.
    pub payment_intent_id: Option<String>,
}

impl CheckoutState {
    /// Start a new checkout attempt.
    #[must_use]
    pub fn new(
        contact_email: Email,
        shipping: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            contact_email,
            shipping,
            payment_method,
            payment_intent_id: None,
        }
    }
}
