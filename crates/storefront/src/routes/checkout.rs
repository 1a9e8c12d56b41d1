//! Checkout route handlers.
//!
//! The flow is start → payment → confirm. The payment step stashes the
//! checkout state in the session; confirm removes it first, so a duplicate
//! submit finds no state and cannot materialize a second order.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use petfun_core::{Email, PaymentMethod};

use crate::error::{AppError, Result};
use crate::models::{CartView, CheckoutState, ShippingAddress, session_keys};
use crate::services::checkout::{CheckoutDraft, CheckoutError, ConfirmOutcome};
use crate::state::AppState;

use super::{principal, session_error};

/// Payment step payload: contact, shipping, and payment method.
#[derive(Debug, Deserialize)]
pub struct PaymentForm {
    pub contact_email: String,
    pub shipping: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// Payment step response.
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    /// Present for card payments; the browser uses it to collect the card.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// Confirm response.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfirmResponse {
    /// The order was placed.
    Placed { tracking_code: String, total: Decimal },
    /// The cart was corrected against live stock; review it and retry.
    Adjusted {
        notes: Vec<String>,
        cart_emptied: bool,
    },
}

/// Begin checkout; fails on an empty cart.
#[instrument(skip(state, session))]
pub async fn start(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let principal = principal(&session).await?;
    let cart = state.carts().resolve_cart(&principal).await?;
    let view = state.checkout().begin_checkout(&cart).await?;
    Ok(Json(view))
}

/// Capture contact and shipping details; for card payments, create the
/// payment intent and hand the client secret back.
#[instrument(skip(state, session, form))]
pub async fn payment(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<PaymentForm>,
) -> Result<Json<PaymentResponse>> {
    let contact_email = Email::parse(&form.contact_email)
        .map_err(|e| AppError::BadRequest(format!("invalid contact email: {e}")))?;

    let principal = principal(&session).await?;
    let cart = state.carts().resolve_cart(&principal).await?;
    let setup = state
        .checkout()
        .create_payment_intent(
            &cart,
            CheckoutDraft {
                contact_email,
                shipping: form.shipping,
                payment_method: form.payment_method,
            },
        )
        .await?;

    session
        .insert(session_keys::CHECKOUT_STATE, &setup.state)
        .await
        .map_err(session_error)?;

    Ok(Json(PaymentResponse {
        client_secret: setup.client_secret,
    }))
}

/// Confirm the order.
///
/// The checkout state is removed from the session before materialization,
/// success or failure; a failed payment routes the buyer back through the
/// payment step, which issues fresh state.
#[instrument(skip(state, session))]
pub async fn confirm(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ConfirmResponse>> {
    let checkout_state: CheckoutState = session
        .remove(session_keys::CHECKOUT_STATE)
        .await
        .map_err(session_error)?
        .ok_or(AppError::Checkout(CheckoutError::PaymentSessionMissing))?;

    let principal = principal(&session).await?;
    let cart = state.carts().resolve_cart(&principal).await?;

    match state.checkout().confirm(&cart, &checkout_state).await? {
        ConfirmOutcome::Placed(order) => Ok(Json(ConfirmResponse::Placed {
            tracking_code: order.tracking_code,
            total: order.total,
        })),
        ConfirmOutcome::Adjusted {
            notes,
            cart_emptied,
        } => Ok(Json(ConfirmResponse::Adjusted {
            notes,
            cart_emptied,
        })),
    }
}
