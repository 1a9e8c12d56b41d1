//! Product read endpoint.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use petfun_core::{Availability, ProductId};

use crate::error::{AppError, Result};
use crate::models::Product;
use crate::state::AppState;

/// Public product view: catalog fields plus derived availability.
#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    pub availability: Availability,
    pub category: String,
    pub manufacturer: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        let availability = product.availability();
        Self {
            id: product.id,
            sku: product.sku,
            name: product.name,
            short_description: product.short_description,
            description: product.description,
            price: product.price,
            stock: product.stock,
            availability,
            category: product.category,
            manufacturer: product.manufacturer,
            updated_at: product.updated_at,
        }
    }
}

/// Product detail.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ProductView>> {
    let product = state
        .store()
        .get_product(ProductId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    Ok(Json(ProductView::from(product)))
}
