//! Session-scoped identity passed explicitly into every core operation.

use serde::{Deserialize, Serialize};

use petfun_core::UserId;

/// The caller's identity: an optional authenticated user plus the anonymous
/// session token.
///
/// No ambient request globals: services receive the principal as a value.
/// When `user_id` is present it is the cart-binding key; the session token
/// is only a secondary lookup aid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Option<UserId>,
    pub session_token: String,
}

impl Principal {
    /// An anonymous principal identified only by its session token.
    #[must_use]
    pub fn anonymous(session_token: impl Into<String>) -> Self {
        Self {
            user_id: None,
            session_token: session_token.into(),
        }
    }

    /// An authenticated principal.
    #[must_use]
    pub fn user(user_id: UserId, session_token: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            session_token: session_token.into(),
        }
    }
}

/// Session keys for storefront data.
pub mod session_keys {
    /// Key for the anonymous session token.
    pub const SESSION_TOKEN: &str = "session_token";

    /// Key for the authenticated user id (set by the auth layer).
    pub const USER_ID: &str = "user_id";

    /// Key for the in-flight checkout state.
    pub const CHECKOUT_STATE: &str = "checkout_state";
}
