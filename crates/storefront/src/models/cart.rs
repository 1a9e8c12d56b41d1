//! Cart aggregate: a mutable collection of priced lines for one
//! anonymous-session-or-user.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use petfun_core::{CartId, CartLineId, ProductId, UserId};

/// A shopping cart.
///
/// Owned by an authenticated user (the binding key when present) or by an
/// anonymous session token. `total` is always the sum of line subtotals;
/// every line mutation recomputes it inside the same transaction.
///
/// Carts are created lazily, never deleted on logout, and never merged when
/// an anonymous session logs in: an authenticated principal always resolves
/// to a cart bound to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: Option<UserId>,
    pub session_token: Option<String>,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One (product, quantity, price-snapshot) entry within a cart.
///
/// At most one line exists per (cart, product) pair. The subtotal is always
/// `unit_price * quantity`; construct via [`CartLine::new`] so it can never
/// drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl CartLine {
    /// Build a line with its subtotal derived from price and quantity.
    #[must_use]
    pub fn new(
        id: CartLineId,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            id,
            cart_id,
            product_id,
            quantity,
            unit_price,
            subtotal: unit_price * Decimal::from(quantity),
        }
    }
}

/// Cart contents exposed to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub total: Decimal,
}

impl CartView {
    /// An empty cart view.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            lines: Vec::new(),
            total: Decimal::ZERO,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// One cart line joined with its product name for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn subtotal_is_price_times_quantity() {
        let line = CartLine::new(
            CartLineId::new(1),
            CartId::new(1),
            ProductId::new(7),
            3,
            dec!(12.50),
        );
        assert_eq!(line.subtotal, dec!(37.50));
    }
}
