//! HTTP route handlers for the storefront core.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Health check
//!
//! # Catalog
//! GET  /products/{id}          - Product read (price, stock, availability)
//!
//! # Cart
//! GET  /cart                   - Current cart contents
//! POST /cart/add               - Add a product (merges into existing line)
//! POST /cart/update            - Set a line's quantity
//! POST /cart/remove            - Remove a line (idempotent)
//!
//! # Checkout
//! GET  /checkout/start         - Begin checkout (cart must be non-empty)
//! POST /checkout/payment       - Capture contact/shipping, create intent
//! POST /checkout/confirm       - Materialize the order
//!
//! # Tracking
//! GET  /track/{code}           - Public order lookup by tracking code
//! ```

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod track;

use axum::{
    Router,
    routing::{get, post},
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Principal, session_keys};
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/start", get(checkout::start))
        .route("/payment", post(checkout::payment))
        .route("/confirm", post(checkout::confirm))
}

/// Create the full application router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/products/{id}", get(catalog::show))
        .route("/track/{code}", get(track::show))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
}

/// Health check endpoint.
async fn health() -> &'static str {
    "OK"
}

/// Resolve the caller's identity from the session, minting an anonymous
/// session token on first contact.
pub(crate) async fn principal(session: &Session) -> Result<Principal> {
    let token: Option<String> = session
        .get(session_keys::SESSION_TOKEN)
        .await
        .map_err(session_error)?;

    let session_token = match token {
        Some(token) => token,
        None => {
            let token = Uuid::new_v4().to_string();
            session
                .insert(session_keys::SESSION_TOKEN, &token)
                .await
                .map_err(session_error)?;
            token
        }
    };

    let user_id = session
        .get(session_keys::USER_ID)
        .await
        .map_err(session_error)?;

    Ok(Principal {
        user_id,
        session_token,
    })
}

pub(crate) fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session error: {e}"))
}
