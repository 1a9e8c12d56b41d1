//! Cart aggregate operations.
//!
//! Every line mutation runs in one storage transaction: lock the product,
//! write the line, recompute the cart total from all lines, commit. The
//! total is therefore never eventually-consistent with the lines.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use petfun_core::ProductId;

use crate::db::{Store, StoreError, StoreTx};
use crate::models::{Cart, CartView, CartLineView, Principal};

/// Cart-mutation domain errors. None of these touch inventory.
#[derive(Debug, Error)]
pub enum CartError {
    /// The referenced product does not exist.
    #[error("product not found")]
    InvalidProduct,

    /// The product has no stock left.
    #[error("product is sold out")]
    OutOfStock,

    /// Update targeted a product with no line in the cart.
    #[error("item is not in the cart")]
    ItemNotInCart,

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Cart resolution and line mutation.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolve the principal's cart, creating one lazily on first use.
    ///
    /// An authenticated principal always gets the most recent cart bound to
    /// the user; the session token is attached to it as a lookup aid but no
    /// anonymous cart is ever merged in. An anonymous principal resolves by
    /// session token alone.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    pub async fn resolve_cart(&self, principal: &Principal) -> Result<Cart, CartError> {
        if let Some(user_id) = principal.user_id {
            let Some(mut cart) = self.store.find_cart_by_user(user_id).await? else {
                let cart = self
                    .store
                    .create_cart(Some(user_id), Some(&principal.session_token))
                    .await?;
                return Ok(cart);
            };
            if cart.session_token.as_deref() != Some(principal.session_token.as_str()) {
                self.store
                    .attach_session_token(cart.id, &principal.session_token)
                    .await?;
                cart.session_token = Some(principal.session_token.clone());
            }
            return Ok(cart);
        }

        if let Some(cart) = self
            .store
            .find_cart_by_session(&principal.session_token)
            .await?
        {
            return Ok(cart);
        }
        let cart = self
            .store
            .create_cart(None, Some(&principal.session_token))
            .await?;
        Ok(cart)
    }

    /// Current cart contents joined with product names.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    pub async fn view(&self, cart: &Cart) -> Result<CartView, CartError> {
        let lines = self.store.cart_lines(cart.id).await?;
        if lines.is_empty() {
            return Ok(CartView::empty());
        }

        let ids: Vec<ProductId> = lines.iter().map(|line| line.product_id).collect();
        let products = self.store.get_products(&ids).await?;
        let names: HashMap<ProductId, String> = products
            .into_iter()
            .map(|product| (product.id, product.name))
            .collect();

        let total = lines.iter().map(|line| line.subtotal).sum();
        let lines = lines
            .into_iter()
            .map(|line| CartLineView {
                product_id: line.product_id,
                name: names.get(&line.product_id).cloned().unwrap_or_default(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                subtotal: line.subtotal,
            })
            .collect();

        Ok(CartView { lines, total })
    }

    /// Add `qty` of a product, merging into an existing line for the same
    /// product. Quantities below 1 are clamped to 1; the merged quantity is
    /// clamped to current stock with the excess silently dropped. The unit
    /// price is refreshed to the current product price.
    ///
    /// # Errors
    ///
    /// `InvalidProduct` if the product does not exist, `OutOfStock` if its
    /// stock is zero, or a storage error.
    pub async fn add_line(
        &self,
        cart: &Cart,
        product_id: ProductId,
        qty: i64,
    ) -> Result<CartView, CartError> {
        let qty = clamp_quantity(qty);

        let mut tx = self.store.begin().await?;
        let product = lock_one(tx.as_mut(), product_id).await?;
        if product.stock == 0 {
            return Err(CartError::OutOfStock);
        }

        let lines = tx.cart_lines(cart.id).await?;
        let existing = lines
            .iter()
            .find(|line| line.product_id == product_id)
            .map_or(0, |line| line.quantity);
        let quantity = existing.saturating_add(qty).min(product.stock);

        tx.upsert_cart_line(cart.id, product_id, quantity, product.price)
            .await?;
        self.settle(tx, cart).await
    }

    /// Set the quantity of an existing line, clamped to 1..=stock, and
    /// refresh its unit price.
    ///
    /// # Errors
    ///
    /// `ItemNotInCart` if the cart holds no line for the product,
    /// `InvalidProduct`/`OutOfStock` as for [`Self::add_line`], or a storage
    /// error.
    pub async fn update_line(
        &self,
        cart: &Cart,
        product_id: ProductId,
        qty: i64,
    ) -> Result<CartView, CartError> {
        let qty = clamp_quantity(qty);

        let mut tx = self.store.begin().await?;
        let product = lock_one(tx.as_mut(), product_id).await?;
        if product.stock == 0 {
            return Err(CartError::OutOfStock);
        }

        let lines = tx.cart_lines(cart.id).await?;
        if !lines.iter().any(|line| line.product_id == product_id) {
            return Err(CartError::ItemNotInCart);
        }

        let quantity = qty.min(product.stock);
        tx.upsert_cart_line(cart.id, product_id, quantity, product.price)
            .await?;
        self.settle(tx, cart).await
    }

    /// Remove a product's line. Removing an absent line is not an error.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    pub async fn remove_line(
        &self,
        cart: &Cart,
        product_id: ProductId,
    ) -> Result<CartView, CartError> {
        let mut tx = self.store.begin().await?;
        tx.delete_cart_line(cart.id, product_id).await?;
        self.settle(tx, cart).await
    }

    /// Recompute the total from the lines, commit, and return the fresh view.
    async fn settle(
        &self,
        mut tx: Box<dyn StoreTx + '_>,
        cart: &Cart,
    ) -> Result<CartView, CartError> {
        let lines = tx.cart_lines(cart.id).await?;
        let total = lines.iter().map(|line| line.subtotal).sum();
        tx.set_cart_total(cart.id, total).await?;
        tx.commit().await?;
        self.view(cart).await
    }
}

fn clamp_quantity(qty: i64) -> u32 {
    u32::try_from(qty.max(1)).unwrap_or(u32::MAX)
}

async fn lock_one(
    tx: &mut (dyn StoreTx + '_),
    product_id: ProductId,
) -> Result<crate::models::Product, CartError> {
    tx.lock_products(&[product_id])
        .await?
        .into_iter()
        .next()
        .ok_or(CartError::InvalidProduct)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::db::memory::MemoryStore;
    use crate::models::NewProduct;

    use super::*;

    fn toy(price: rust_decimal::Decimal, stock: u32) -> NewProduct {
        use std::sync::atomic::{AtomicU32, Ordering};
        static SKU_SEQ: AtomicU32 = AtomicU32::new(0);
        NewProduct {
            sku: format!("PF-CART{:04}", SKU_SEQ.fetch_add(1, Ordering::Relaxed)),
            name: "Rope Tug".to_string(),
            short_description: String::new(),
            description: String::new(),
            price,
            stock,
            category: "toys".to_string(),
            manufacturer: None,
        }
    }

    fn service() -> (Arc<MemoryStore>, CartService) {
        let store = Arc::new(MemoryStore::new());
        let service = CartService::new(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn total_tracks_line_subtotals() {
        let (store, carts) = service();
        let a = store.insert_product(toy(dec!(4.00), 10)).await.unwrap();
        let b = store.insert_product(toy(dec!(2.50), 10)).await.unwrap();

        let principal = Principal::anonymous("sess-1");
        let cart = carts.resolve_cart(&principal).await.unwrap();

        let view = carts.add_line(&cart, a.id, 2).await.unwrap();
        assert_eq!(view.total, dec!(8.00));

        let view = carts.add_line(&cart, b.id, 3).await.unwrap();
        assert_eq!(view.total, dec!(15.50));

        let view = carts.update_line(&cart, a.id, 1).await.unwrap();
        assert_eq!(view.total, dec!(11.50));

        let view = carts.remove_line(&cart, b.id).await.unwrap();
        assert_eq!(view.total, dec!(4.00));

        let stored = store.get_cart(cart.id).await.unwrap().unwrap();
        assert_eq!(stored.total, dec!(4.00));
    }

    #[tokio::test]
    async fn re_adding_merges_and_clamps_to_stock() {
        let (store, carts) = service();
        let product = store.insert_product(toy(dec!(5.00), 4)).await.unwrap();

        let cart = carts
            .resolve_cart(&Principal::anonymous("sess-2"))
            .await
            .unwrap();

        carts.add_line(&cart, product.id, 3).await.unwrap();
        let view = carts.add_line(&cart, product.id, 3).await.unwrap();

        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].quantity, 4);
        assert_eq!(view.total, dec!(20.00));
    }

    #[tokio::test]
    async fn zero_stock_rejects_add() {
        let (store, carts) = service();
        let product = store.insert_product(toy(dec!(5.00), 0)).await.unwrap();

        let cart = carts
            .resolve_cart(&Principal::anonymous("sess-3"))
            .await
            .unwrap();

        let err = carts.add_line(&cart, product.id, 1).await.unwrap_err();
        assert!(matches!(err, CartError::OutOfStock));
    }

    #[tokio::test]
    async fn update_requires_existing_line() {
        let (store, carts) = service();
        let product = store.insert_product(toy(dec!(5.00), 5)).await.unwrap();

        let cart = carts
            .resolve_cart(&Principal::anonymous("sess-4"))
            .await
            .unwrap();

        let err = carts.update_line(&cart, product.id, 2).await.unwrap_err();
        assert!(matches!(err, CartError::ItemNotInCart));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (store, carts) = service();
        let product = store.insert_product(toy(dec!(5.00), 5)).await.unwrap();

        let cart = carts
            .resolve_cart(&Principal::anonymous("sess-5"))
            .await
            .unwrap();

        let view = carts.remove_line(&cart, product.id).await.unwrap();
        assert!(view.is_empty());
    }

    #[tokio::test]
    async fn quantities_below_one_clamp_to_one() {
        let (store, carts) = service();
        let product = store.insert_product(toy(dec!(3.00), 5)).await.unwrap();

        let cart = carts
            .resolve_cart(&Principal::anonymous("sess-6"))
            .await
            .unwrap();

        let view = carts.add_line(&cart, product.id, -7).await.unwrap();
        assert_eq!(view.lines[0].quantity, 1);
    }

    #[tokio::test]
    async fn login_never_merges_the_anonymous_cart() {
        let (store, carts) = service();
        let product = store.insert_product(toy(dec!(3.00), 5)).await.unwrap();

        let anon = Principal::anonymous("sess-7");
        let anon_cart = carts.resolve_cart(&anon).await.unwrap();
        carts.add_line(&anon_cart, product.id, 2).await.unwrap();

        let email = petfun_core::Email::parse("pat@example.com").unwrap();
        let user_id = store.insert_user(&email).await.unwrap();
        let user = Principal::user(user_id, "sess-7");

        let user_cart = carts.resolve_cart(&user).await.unwrap();
        assert_ne!(user_cart.id, anon_cart.id);
        let view = carts.view(&user_cart).await.unwrap();
        assert!(view.is_empty());
    }
}
