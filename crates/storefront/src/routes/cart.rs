//! Cart route handlers.
//!
//! Every mutation resolves the caller's cart from the session principal and
//! returns the full refreshed cart view.

use axum::{Json, extract::State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use petfun_core::ProductId;

use crate::error::Result;
use crate::models::CartView;
use crate::state::AppState;

use super::principal;

/// Add to cart payload.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i32,
    pub quantity: Option<i64>,
}

/// Update cart line payload.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: i32,
    pub quantity: i64,
}

/// Remove cart line payload.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: i32,
}

/// Current cart contents.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let principal = principal(&session).await?;
    let cart = state.carts().resolve_cart(&principal).await?;
    let view = state.carts().view(&cart).await?;
    Ok(Json(view))
}

/// Add a product to the cart.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<AddToCartForm>,
) -> Result<Json<CartView>> {
    let principal = principal(&session).await?;
    let cart = state.carts().resolve_cart(&principal).await?;
    let view = state
        .carts()
        .add_line(
            &cart,
            ProductId::new(form.product_id),
            form.quantity.unwrap_or(1),
        )
        .await?;
    Ok(Json(view))
}

/// Set the quantity of an existing line.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<UpdateCartForm>,
) -> Result<Json<CartView>> {
    let principal = principal(&session).await?;
    let cart = state.carts().resolve_cart(&principal).await?;
    let view = state
        .carts()
        .update_line(&cart, ProductId::new(form.product_id), form.quantity)
        .await?;
    Ok(Json(view))
}

/// Remove a line from the cart.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<RemoveFromCartForm>,
) -> Result<Json<CartView>> {
    let principal = principal(&session).await?;
    let cart = state.carts().resolve_cart(&principal).await?;
    let view = state
        .carts()
        .remove_line(&cart, ProductId::new(form.product_id))
        .await?;
    Ok(Json(view))
}
