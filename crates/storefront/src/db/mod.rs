//! Storage layer for the storefront.
//!
//! The [`Store`] / [`StoreTx`] pair is an explicit transactional repository:
//! [`Store::begin`] opens a transaction whose [`StoreTx::lock_products`]
//! returns point-in-time product snapshots under an exclusive lock held
//! until the transaction ends. That batched lock is the sole serialization
//! point between concurrent checkouts touching the same stock.
//!
//! Two backends implement the pair:
//!
//! - [`postgres::PgStore`] over `sqlx` (`SELECT ... FOR UPDATE`, row locks
//!   released at commit)
//! - [`memory::MemoryStore`] whose transaction holds a store-wide async
//!   mutex (used by tests)

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use petfun_core::{CartId, Email, OrderId, ProductId, UserId};

use crate::models::{Cart, CartLine, NewOrder, NewOrderLine, NewProduct, Order, OrderLine, Product};

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Referenced row does not exist.
    #[error("not found")]
    NotFound,

    /// Unique or referential constraint violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value could not be interpreted.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Read side and transaction factory.
///
/// Non-transactional methods are individually atomic; anything that must
/// observe or mutate several rows consistently goes through [`Store::begin`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a transaction. Dropping the returned value without calling
    /// [`StoreTx::commit`] rolls every staged write back.
    async fn begin(&self) -> Result<Box<dyn StoreTx + '_>, StoreError>;

    // --- catalog ---

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;
    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError>;
    async fn sku_exists(&self, sku: &str) -> Result<bool, StoreError>;

    // --- carts ---

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>, StoreError>;
    /// Most-recently-created cart owned by the user, if any.
    async fn find_cart_by_user(&self, user_id: UserId) -> Result<Option<Cart>, StoreError>;
    async fn find_cart_by_session(&self, session_token: &str) -> Result<Option<Cart>, StoreError>;
    async fn create_cart(
        &self,
        user_id: Option<UserId>,
        session_token: Option<&str>,
    ) -> Result<Cart, StoreError>;
    /// Attach a session token to an existing cart as a lookup aid.
    async fn attach_session_token(
        &self,
        cart_id: CartId,
        session_token: &str,
    ) -> Result<(), StoreError>;
    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, StoreError>;

    // --- orders ---

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;
    async fn find_order_by_tracking_code(&self, code: &str)
    -> Result<Option<Order>, StoreError>;
    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, StoreError>;
    async fn count_orders(&self) -> Result<u64, StoreError>;

    // --- users ---

    async fn insert_user(&self, email: &Email) -> Result<UserId, StoreError>;
    /// Delete a user. Their orders survive with a null owner.
    async fn delete_user(&self, user_id: UserId) -> Result<(), StoreError>;
}

/// An open storage transaction.
///
/// All writes are staged; nothing is observable outside the transaction
/// until [`StoreTx::commit`]. Locks acquired by
/// [`StoreTx::lock_products`] are released at commit or rollback.
#[async_trait]
pub trait StoreTx: Send {
    /// Acquire exclusive locks on every listed product in one batched call
    /// and return their point-in-time snapshots.
    ///
    /// Ids are deduplicated and locked in sorted order so two transactions
    /// with overlapping product sets cannot deadlock. Missing ids are
    /// simply absent from the result.
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    /// Decrement a product's stock, clamping at zero, and return the new
    /// stock count. Callers are responsible for pre-validating against a
    /// locked snapshot; the clamp is a backstop, not an error.
    async fn decrement_stock(&mut self, id: ProductId, qty: u32) -> Result<u32, StoreError>;

    async fn cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>, StoreError>;

    /// Insert or replace the single line for (cart, product) and return it.
    async fn upsert_cart_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<CartLine, StoreError>;

    /// Delete the line for (cart, product). Deleting an absent line is not
    /// an error.
    async fn delete_cart_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<(), StoreError>;

    async fn clear_cart_lines(&mut self, cart_id: CartId) -> Result<(), StoreError>;

    async fn set_cart_total(&mut self, cart_id: CartId, total: Decimal)
    -> Result<(), StoreError>;

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, StoreError>;

    async fn insert_order_line(&mut self, line: &NewOrderLine) -> Result<OrderLine, StoreError>;

    async fn tracking_code_exists(&mut self, code: &str) -> Result<bool, StoreError>;

    /// Commit every staged write and release all locks.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Timestamp pair used when backends materialize rows.
#[must_use]
pub(crate) fn now_pair() -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    (now, now)
}
