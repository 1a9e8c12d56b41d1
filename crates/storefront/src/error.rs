//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server errors are captured
//! to Sentry before responding; domain errors map to specific statuses and
//! carry a `resume_step` hint telling the client which checkout step can
//! resolve the failure.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::StoreError;
use crate::services::{CartError, CheckoutError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart mutation failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Checkout step failed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    /// Earliest checkout step able to resolve the failure, when applicable:
    /// `cart`, `checkout`, or `payment`.
    #[serde(skip_serializing_if = "Option::is_none")]
    resume_step: Option<&'static str>,
}

impl AppError {
    fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Store(_)
                | Self::Internal(_)
                | Self::Cart(CartError::Store(_))
                | Self::Checkout(CheckoutError::Store(_))
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Cart(err) => match err {
                CartError::InvalidProduct | CartError::ItemNotInCart => StatusCode::NOT_FOUND,
                CartError::OutOfStock => StatusCode::CONFLICT,
                CartError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart
                | CheckoutError::GatewayUnconfigured
                | CheckoutError::StockChanged { .. } => StatusCode::CONFLICT,
                CheckoutError::PaymentSessionMissing
                | CheckoutError::PaymentVerificationFailed
                | CheckoutError::PaymentAmountMismatch { .. }
                | CheckoutError::PaymentNotReady { .. }
                | CheckoutError::PaymentCaptureFailed => StatusCode::PAYMENT_REQUIRED,
                CheckoutError::OrderNotFound => StatusCode::NOT_FOUND,
                CheckoutError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn resume_step(&self) -> Option<&'static str> {
        match self {
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => Some("cart"),
                CheckoutError::StockChanged { .. } => Some("checkout"),
                CheckoutError::GatewayUnconfigured
                | CheckoutError::PaymentSessionMissing
                | CheckoutError::PaymentVerificationFailed
                | CheckoutError::PaymentAmountMismatch { .. }
                | CheckoutError::PaymentNotReady { .. }
                | CheckoutError::PaymentCaptureFailed => Some("payment"),
                CheckoutError::OrderNotFound | CheckoutError::Store(_) => None,
            },
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = if self.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: message,
            resume_step: self.resume_step(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_errors_route_to_payment_step() {
        let err = AppError::Checkout(CheckoutError::PaymentAmountMismatch {
            expected: 2400,
            actual: 2300,
        });
        assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.resume_step(), Some("payment"));
    }

    #[test]
    fn empty_cart_routes_to_cart() {
        let err = AppError::Checkout(CheckoutError::EmptyCart);
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.resume_step(), Some("cart"));
    }

    #[test]
    fn storage_errors_hide_details() {
        let err = AppError::Store(StoreError::NotFound);
        assert!(err.is_server_error());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
