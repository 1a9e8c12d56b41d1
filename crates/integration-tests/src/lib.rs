//! Shared test support: an in-memory harness wiring the cart and checkout
//! services over the memory store, plus a scripted payment gateway.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use petfun_core::PaymentMethod;
use petfun_storefront::db::Store;
use petfun_storefront::db::memory::MemoryStore;
use petfun_storefront::models::{NewProduct, Product, ShippingAddress};
use petfun_storefront::payments::{
    CreatedIntent, IntentStatus, PaymentError, PaymentGateway, PaymentIntent,
};
use petfun_storefront::services::{CartService, CheckoutDraft, CheckoutService};

/// Services over a fresh memory store.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub carts: CartService,
    pub checkout: CheckoutService,
}

/// Harness without a payment gateway: card checkout skips verification.
#[must_use]
pub fn harness() -> Harness {
    build(None)
}

/// Harness with a scripted gateway standing in for the card processor.
#[must_use]
pub fn harness_with_gateway(gateway: Arc<ScriptedGateway>) -> Harness {
    build(Some(gateway))
}

fn build(gateway: Option<Arc<ScriptedGateway>>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let carts = CartService::new(store.clone());
    let checkout = CheckoutService::new(
        store.clone(),
        carts.clone(),
        gateway.map(|g| g as Arc<dyn PaymentGateway>),
        None,
    );
    Harness {
        store,
        carts,
        checkout,
    }
}

/// Insert a product with the given price and stock.
///
/// # Panics
///
/// Panics if the insert fails.
pub async fn seed_product(
    store: &MemoryStore,
    name: &str,
    price: Decimal,
    stock: u32,
) -> Product {
    static SKU_SEQ: AtomicU32 = AtomicU32::new(0);
    let seq = SKU_SEQ.fetch_add(1, Ordering::Relaxed);
    store
        .insert_product(NewProduct {
            sku: format!("PF-TEST{seq:04}"),
            name: name.to_string(),
            short_description: String::new(),
            description: format!("{name} for your pet."),
            price,
            stock,
            category: "toys".to_string(),
            manufacturer: None,
        })
        .await
        .expect("insert product")
}

/// A checkout draft with a fixed shipping address.
///
/// # Panics
///
/// Panics if the fixed email fails to parse.
#[must_use]
pub fn draft(payment_method: PaymentMethod) -> CheckoutDraft {
    CheckoutDraft {
        contact_email: petfun_core::Email::parse("buyer@example.com").expect("valid email"),
        shipping: ShippingAddress {
            name: "Pat Buyer".to_string(),
            street: "Calle Luna".to_string(),
            number: "42".to_string(),
            floor: String::new(),
            city: "Madrid".to_string(),
            postal_code: "28001".to_string(),
            country: "ES".to_string(),
        },
        payment_method,
    }
}

/// Scripted stand-in for the card processor. Tests set the intent state the
/// gateway reports and observe capture calls.
pub struct ScriptedGateway {
    state: Mutex<GatewayState>,
}

struct GatewayState {
    status: IntentStatus,
    /// Amount the intent reports; set on `create_intent` unless overridden.
    amount: i64,
    amount_override: Option<i64>,
    fail_capture: bool,
    captures: Vec<String>,
}

impl ScriptedGateway {
    #[must_use]
    pub fn new(status: IntentStatus) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(GatewayState {
                status,
                amount: 0,
                amount_override: None,
                fail_capture: false,
                captures: Vec::new(),
            }),
        })
    }

    /// Force the reported intent amount, regardless of what was created.
    pub fn override_amount(&self, amount: i64) {
        self.lock().amount_override = Some(amount);
    }

    /// Make the next capture call fail.
    pub fn fail_capture(&self) {
        self.lock().fail_capture = true;
    }

    /// Intent ids captured so far.
    #[must_use]
    pub fn captures(&self) -> Vec<String> {
        self.lock().captures.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GatewayState> {
        self.state.lock().expect("gateway state poisoned")
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_intent(
        &self,
        amount: i64,
        _currency: &str,
    ) -> Result<CreatedIntent, PaymentError> {
        self.lock().amount = amount;
        Ok(CreatedIntent {
            id: "pi_scripted".to_string(),
            client_secret: "pi_scripted_secret".to_string(),
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let state = self.lock();
        Ok(PaymentIntent {
            id: intent_id.to_string(),
            status: state.status,
            amount: state.amount_override.unwrap_or(state.amount),
        })
    }

    async fn capture_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let mut state = self.lock();
        if state.fail_capture {
            return Err(PaymentError::Api {
                status: 402,
                message: "capture declined".to_string(),
            });
        }
        state.status = IntentStatus::Succeeded;
        state.captures.push(intent_id.to_string());
        let amount = state.amount_override.unwrap_or(state.amount);
        Ok(PaymentIntent {
            id: intent_id.to_string(),
            status: IntentStatus::Succeeded,
            amount,
        })
    }
}
