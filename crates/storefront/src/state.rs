//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::Store;
use crate::payments::{PaymentGateway, StripeGateway};
use crate::services::{CartService, CheckoutService, Mailer};

/// Errors building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway setup failed: {0}")]
    Gateway(#[from] crate::payments::PaymentError),
    #[error("mailer setup failed: {0}")]
    Mailer(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; hands out the domain services plus the
/// underlying store for readiness checks.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn Store>,
    carts: CartService,
    checkout: CheckoutService,
}

impl AppState {
    /// Wire up services over a store, constructing the payment gateway and
    /// mailer from configuration when present.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway or SMTP client fails to build.
    pub fn new(config: StorefrontConfig, store: Arc<dyn Store>) -> Result<Self, StateError> {
        let gateway: Option<Arc<dyn PaymentGateway>> = match &config.stripe {
            Some(stripe) => Some(Arc::new(StripeGateway::new(stripe)?)),
            None => None,
        };
        let mailer = match &config.smtp {
            Some(smtp) => Some(Arc::new(Mailer::new(smtp)?)),
            None => None,
        };

        let carts = CartService::new(store.clone());
        let checkout = CheckoutService::new(store.clone(), carts.clone(), gateway, mailer);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                carts,
                checkout,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    /// Get a reference to the cart service.
    #[must_use]
    pub fn carts(&self) -> &CartService {
        &self.inner.carts
    }

    /// Get a reference to the checkout service.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }
}
