//! The checkout pipeline: payment setup and order materialization.
//!
//! Materialization is two-phase inside one storage transaction. Phase one
//! locks every product the cart references and corrects the cart against
//! the locked snapshots; any correction commits the corrected cart and
//! aborts the order. Phase two captures the payment, writes the order and
//! its line snapshots, decrements stock, and empties the cart. The buyer is
//! never charged for a cart that did not clear validation atomically.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;

use petfun_core::{OrderStatus, PaymentMethod, ProductId, to_minor_units};

use crate::db::{Store, StoreError};
use crate::models::{
    Cart, CartView, CheckoutState, NewOrder, NewOrderLine, Order, OrderSummary, Product,
    ShippingAddress,
};
use crate::payments::{IntentStatus, PaymentGateway};

use super::cart::{CartError, CartService};
use super::codes;
use super::email::Mailer;

/// Checkout failures. Each maps to the earliest step able to resolve it.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Checkout cannot start or complete on an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// Card payment requested but no gateway is configured.
    #[error("card payments are not available")]
    GatewayUnconfigured,

    /// Checkout state carries no payment-intent handle.
    #[error("payment session is missing")]
    PaymentSessionMissing,

    /// The gateway could not be reached or rejected the lookup.
    #[error("payment could not be verified")]
    PaymentVerificationFailed,

    /// The authorized amount does not match the cart total.
    #[error("payment amount mismatch: expected {expected} minor units, intent holds {actual}")]
    PaymentAmountMismatch { expected: i64, actual: i64 },

    /// The intent is not in a capturable or settled state.
    #[error("payment is not ready: intent status is {status}")]
    PaymentNotReady { status: &'static str },

    /// Capturing the authorized hold failed.
    #[error("payment capture failed")]
    PaymentCaptureFailed,

    /// Final pre-decrement guard tripped; the whole transaction rolls back.
    #[error("stock changed during checkout for product {product}")]
    StockChanged { product: ProductId },

    /// Order not found for a tracking code.
    #[error("order not found")]
    OrderNotFound,

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CartError> for CheckoutError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::Store(e) => Self::Store(e),
            // Cart-mutation errors cannot escape checkout's read-only use.
            CartError::InvalidProduct | CartError::OutOfStock | CartError::ItemNotInCart => {
                Self::Store(StoreError::DataCorruption(e.to_string()))
            }
        }
    }
}

/// Buyer-supplied fields for the payment step.
#[derive(Debug, Clone)]
pub struct CheckoutDraft {
    pub contact_email: petfun_core::Email,
    pub shipping: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// Result of the payment step: state to stash in the session, plus the
/// client secret when a card intent was created.
#[derive(Debug, Clone)]
pub struct PaymentSetup {
    pub state: CheckoutState,
    pub client_secret: Option<String>,
}

/// Outcome of order confirmation.
#[derive(Debug)]
pub enum ConfirmOutcome {
    /// The order was created; the cart is empty.
    Placed(Order),
    /// The cart was corrected against live stock and the order aborted.
    /// The corrections are committed; the buyer reviews the revised cart.
    Adjusted { notes: Vec<String>, cart_emptied: bool },
}

/// Orchestrates the checkout flow against storage, the payment gateway,
/// and the notification sender.
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn Store>,
    carts: CartService,
    gateway: Option<Arc<dyn PaymentGateway>>,
    mailer: Option<Arc<Mailer>>,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        carts: CartService,
        gateway: Option<Arc<dyn PaymentGateway>>,
        mailer: Option<Arc<Mailer>>,
    ) -> Self {
        Self {
            store,
            carts,
            gateway,
            mailer,
        }
    }

    /// Start checkout: the cart must be non-empty.
    ///
    /// # Errors
    ///
    /// `EmptyCart` or a storage error.
    pub async fn begin_checkout(&self, cart: &Cart) -> Result<CartView, CheckoutError> {
        let view = self.carts.view(cart).await?;
        if view.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        Ok(view)
    }

    /// Capture contact and shipping details and, for card payments, create
    /// a manual-capture intent over the current cart total.
    ///
    /// # Errors
    ///
    /// `EmptyCart`, `GatewayUnconfigured` for card payments without a
    /// configured gateway, `PaymentVerificationFailed` if intent creation
    /// fails, or a storage error.
    pub async fn create_payment_intent(
        &self,
        cart: &Cart,
        draft: CheckoutDraft,
    ) -> Result<PaymentSetup, CheckoutError> {
        let view = self.carts.view(cart).await?;
        if view.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut state = CheckoutState::new(draft.contact_email, draft.shipping, draft.payment_method);

        if draft.payment_method == PaymentMethod::Card {
            let gateway = self
                .gateway
                .as_ref()
                .ok_or(CheckoutError::GatewayUnconfigured)?;
            let amount = to_minor_units(view.total);
            let created = gateway
                .create_intent(amount, "eur")
                .await
                .map_err(|_| CheckoutError::PaymentVerificationFailed)?;
            state.payment_intent_id = Some(created.id);
            return Ok(PaymentSetup {
                state,
                client_secret: Some(created.client_secret),
            });
        }

        Ok(PaymentSetup {
            state,
            client_secret: None,
        })
    }

    /// Materialize the order (or correct the cart and abort).
    ///
    /// See the module docs for the two-phase shape. The caller is expected
    /// to have removed `state` from the session before invoking, so a
    /// duplicate submit finds no state and cannot re-trigger this.
    ///
    /// # Errors
    ///
    /// Payment errors abort with no state mutation and route back to the
    /// payment step; `StockChanged` rolls the whole transaction back; any
    /// storage error likewise leaves no partial writes behind.
    pub async fn confirm(
        &self,
        cart: &Cart,
        state: &CheckoutState,
    ) -> Result<ConfirmOutcome, CheckoutError> {
        let gateway = match (state.payment_method, self.gateway.as_ref()) {
            (PaymentMethod::Card, Some(gateway)) => Some(gateway),
            _ => None,
        };

        // Verify the hold before touching storage: intent present, amount
        // equal to the cart total in minor units, status settled or
        // capturable. Any failure routes back to the payment step.
        if let Some(gateway) = gateway {
            let intent_id = state
                .payment_intent_id
                .as_deref()
                .ok_or(CheckoutError::PaymentSessionMissing)?;
            let intent = gateway
                .retrieve_intent(intent_id)
                .await
                .map_err(|_| CheckoutError::PaymentVerificationFailed)?;

            let expected = to_minor_units(cart.total);
            if intent.amount != expected {
                return Err(CheckoutError::PaymentAmountMismatch {
                    expected,
                    actual: intent.amount,
                });
            }
            if !intent.status.is_confirmed() {
                return Err(CheckoutError::PaymentNotReady {
                    status: intent.status.as_str(),
                });
            }
        }

        let mut tx = self.store.begin().await?;

        let lines = tx.cart_lines(cart.id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        // The single serialization point: every distinct product in the
        // cart, locked in one batched call.
        let ids: Vec<ProductId> = lines.iter().map(|line| line.product_id).collect();
        let products = tx.lock_products(&ids).await?;
        let by_id: HashMap<ProductId, Product> = products
            .into_iter()
            .map(|product| (product.id, product))
            .collect();

        // Phase one: reconcile each line against its locked snapshot.
        let mut notes = Vec::new();
        for line in &lines {
            match by_id.get(&line.product_id) {
                None => {
                    tx.delete_cart_line(cart.id, line.product_id).await?;
                    notes.push(
                        "An item is no longer available and was removed from your cart."
                            .to_string(),
                    );
                }
                Some(product) if product.stock == 0 => {
                    tx.delete_cart_line(cart.id, line.product_id).await?;
                    notes.push(format!(
                        "{} is sold out and was removed from your cart.",
                        product.name
                    ));
                }
                Some(product) if line.quantity > product.stock => {
                    tx.upsert_cart_line(cart.id, line.product_id, product.stock, product.price)
                        .await?;
                    notes.push(format!(
                        "Only {} of {} left; your cart was updated.",
                        product.stock, product.name
                    ));
                }
                Some(product) => {
                    // Price is re-snapshotted at order time; a silent price
                    // refresh is not an adjustment.
                    if line.unit_price != product.price {
                        tx.upsert_cart_line(
                            cart.id,
                            line.product_id,
                            line.quantity,
                            product.price,
                        )
                        .await?;
                    }
                }
            }
        }

        let lines = tx.cart_lines(cart.id).await?;
        let total: Decimal = lines.iter().map(|line| line.subtotal).sum();
        tx.set_cart_total(cart.id, total).await?;

        if !notes.is_empty() {
            // Commit the corrections, abort the order. Never a partial order.
            let cart_emptied = lines.is_empty();
            tx.commit().await?;
            return Ok(ConfirmOutcome::Adjusted {
                notes,
                cart_emptied,
            });
        }

        // Phase two: capture, then materialize.
        if let Some(gateway) = gateway {
            let intent_id = state
                .payment_intent_id
                .as_deref()
                .ok_or(CheckoutError::PaymentSessionMissing)?;
            let intent = gateway
                .retrieve_intent(intent_id)
                .await
                .map_err(|_| CheckoutError::PaymentVerificationFailed)?;
            match intent.status {
                IntentStatus::RequiresCapture => {
                    gateway
                        .capture_intent(intent_id)
                        .await
                        .map_err(|_| CheckoutError::PaymentCaptureFailed)?;
                }
                IntentStatus::Succeeded => {}
                status => {
                    return Err(CheckoutError::PaymentNotReady {
                        status: status.as_str(),
                    });
                }
            }
        }

        let tracking_code = codes::generate_tracking_code(tx.as_mut(), Utc::now()).await?;
        let order = tx
            .insert_order(&NewOrder {
                tracking_code,
                user_id: cart.user_id,
                contact_email: state.contact_email.clone(),
                total,
                status: OrderStatus::Received,
                shipping: state.shipping.clone(),
                payment_method: state.payment_method,
            })
            .await?;

        for line in &lines {
            let product = by_id
                .get(&line.product_id)
                .ok_or(CheckoutError::StockChanged {
                    product: line.product_id,
                })?;
            // Final guard before the decrement; tripping it rolls the whole
            // transaction back, order row included.
            if line.quantity > product.stock {
                return Err(CheckoutError::StockChanged {
                    product: line.product_id,
                });
            }
            tx.insert_order_line(&NewOrderLine {
                order_id: order.id,
                product_id: line.product_id,
                product_name: product.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .await?;
            tx.decrement_stock(line.product_id, line.quantity).await?;
        }

        tx.clear_cart_lines(cart.id).await?;
        tx.set_cart_total(cart.id, Decimal::ZERO).await?;
        tx.commit().await?;

        // Best-effort notification, never part of the transaction.
        if let Some(mailer) = &self.mailer {
            mailer.spawn_order_confirmation(&order);
        }

        Ok(ConfirmOutcome::Placed(order))
    }

    /// Public tracking lookup.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` or a storage error.
    pub async fn track(&self, tracking_code: &str) -> Result<OrderSummary, CheckoutError> {
        let order = self
            .store
            .find_order_by_tracking_code(tracking_code)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        let lines = self.store.order_lines(order.id).await?;
        Ok(OrderSummary::from_order(&order, &lines))
    }
}
