//! Immutable order records materialized at checkout.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use petfun_core::{Email, OrderId, OrderLineId, OrderStatus, PaymentMethod, ProductId, UserId};

use super::checkout::ShippingAddress;

/// An order, immutable after creation except for status transitions.
///
/// The shipping address and contact email are denormalized snapshots; the
/// owning user is nullable so deleting an account leaves its orders intact
/// with anonymous ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Public, human-shareable identifier (`PT-YYYYMM-XXXXXXXX`), distinct
    /// from the internal id.
    pub tracking_code: String,
    pub user_id: Option<UserId>,
    pub contact_email: Email,
    pub total: Decimal,
    pub status: OrderStatus,
    pub shipping: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of an order.
///
/// Product name, unit price, and subtotal are snapshotted at order-creation
/// time and never recomputed from live product state. The product reference
/// itself must survive: product deletion is disallowed while referenced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// Input for creating an order header.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub tracking_code: String,
    pub user_id: Option<UserId>,
    pub contact_email: Email,
    pub total: Decimal,
    pub status: OrderStatus,
    pub shipping: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// Input for creating an order line snapshot.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl NewOrderLine {
    /// Line subtotal, derived from the snapshotted price and quantity.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Public order view returned by the tracking lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub tracking_code: String,
    pub status: OrderStatus,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderSummaryLine>,
}

/// One line of a tracked order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummaryLine {
    pub product_name: String,
    pub quantity: u32,
    pub subtotal: Decimal,
}

impl OrderSummary {
    /// Build a summary from an order and its lines.
    #[must_use]
    pub fn from_order(order: &Order, lines: &[OrderLine]) -> Self {
        Self {
            tracking_code: order.tracking_code.clone(),
            status: order.status,
            total: order.total,
            created_at: order.created_at,
            lines: lines
                .iter()
                .map(|line| OrderSummaryLine {
                    product_name: line.product_name.clone(),
                    quantity: line.quantity,
                    subtotal: line.subtotal,
                })
                .collect(),
        }
    }
}
