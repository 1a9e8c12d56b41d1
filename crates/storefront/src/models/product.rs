//! Catalog product owned by the inventory ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use petfun_core::{Availability, ProductId};

/// A catalog product with its live stock count.
///
/// Availability is never stored: it is always derived from `stock` via
/// [`Product::availability`], so the two can never disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    pub category: String,
    pub manufacturer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Current availability, derived from stock.
    #[must_use]
    pub const fn availability(&self) -> Availability {
        Availability::from_stock(self.stock)
    }
}

/// Input for inserting a product (seeding and admin paths).
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    pub category: String,
    pub manufacturer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(stock: u32) -> Product {
        Product {
            id: ProductId::new(1),
            sku: "PF-TEST0001".to_string(),
            name: "Squeaky Bone".to_string(),
            short_description: String::new(),
            description: String::new(),
            price: dec!(8.00),
            stock,
            category: "Toys".to_string(),
            manufacturer: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn availability_tracks_stock() {
        assert_eq!(product(0).availability(), Availability::SoldOut);
        assert_eq!(product(3).availability(), Availability::Available);
    }
}
