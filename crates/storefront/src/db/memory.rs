//! In-memory storage backend.
//!
//! A transaction takes the store-wide async mutex and mutates a staged copy
//! of the state, swapped in wholesale on commit. Holding the guard for the
//! transaction's lifetime gives the same serialization the Postgres backend
//! gets from row locks: a second checkout on the same store blocks until
//! the first commits or rolls back.
//!
//! Non-transactional methods take the mutex briefly per call. Do not call
//! them while holding an open transaction on the same store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use petfun_core::{CartId, CartLineId, Email, OrderId, OrderLineId, ProductId, UserId};

use crate::models::{Cart, CartLine, NewOrder, NewOrderLine, NewProduct, Order, OrderLine, Product};

use super::{Store, StoreError, StoreTx, now_pair};

#[derive(Default, Clone)]
struct State {
    products: BTreeMap<ProductId, Product>,
    carts: BTreeMap<CartId, Cart>,
    cart_lines: BTreeMap<CartLineId, CartLine>,
    orders: BTreeMap<OrderId, Order>,
    order_lines: BTreeMap<OrderLineId, OrderLine>,
    users: BTreeMap<UserId, Email>,
    next_id: i32,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn lines_of(&self, cart_id: CartId) -> Vec<CartLine> {
        self.cart_lines
            .values()
            .filter(|line| line.cart_id == cart_id)
            .cloned()
            .collect()
    }
}

/// In-memory implementation of [`Store`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a product's catalog price, standing in for an admin edit.
    pub async fn set_product_price(&self, id: ProductId, price: Decimal) {
        let mut state = self.inner.lock().await;
        if let Some(product) = state.products.get_mut(&id) {
            product.price = price;
            product.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx + '_>, StoreError> {
        let guard = Arc::clone(&self.inner).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.lock().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let state = self.inner.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let mut state = self.inner.lock().await;
        if state.products.values().any(|p| p.sku == product.sku) {
            return Err(StoreError::Conflict(format!(
                "sku already exists: {}",
                product.sku
            )));
        }
        let id = ProductId::new(state.next_id());
        let (created_at, updated_at) = now_pair();
        let product = Product {
            id,
            sku: product.sku,
            name: product.name,
            short_description: product.short_description,
            description: product.description,
            price: product.price,
            stock: product.stock,
            category: product.category,
            manufacturer: product.manufacturer,
            created_at,
            updated_at,
        };
        state.products.insert(id, product.clone());
        Ok(product)
    }

    async fn sku_exists(&self, sku: &str) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .products
            .values()
            .any(|p| p.sku == sku))
    }

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>, StoreError> {
        Ok(self.inner.lock().await.carts.get(&id).cloned())
    }

    async fn find_cart_by_user(&self, user_id: UserId) -> Result<Option<Cart>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state
            .carts
            .values()
            .filter(|cart| cart.user_id == Some(user_id))
            .max_by_key(|cart| cart.id)
            .cloned())
    }

    async fn find_cart_by_session(&self, session_token: &str) -> Result<Option<Cart>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state
            .carts
            .values()
            .rev()
            .find(|cart| {
                cart.user_id.is_none() && cart.session_token.as_deref() == Some(session_token)
            })
            .cloned())
    }

    async fn create_cart(
        &self,
        user_id: Option<UserId>,
        session_token: Option<&str>,
    ) -> Result<Cart, StoreError> {
        let mut state = self.inner.lock().await;
        let id = CartId::new(state.next_id());
        let (created_at, updated_at) = now_pair();
        let cart = Cart {
            id,
            user_id,
            session_token: session_token.map(str::to_owned),
            total: Decimal::ZERO,
            created_at,
            updated_at,
        };
        state.carts.insert(id, cart.clone());
        Ok(cart)
    }

    async fn attach_session_token(
        &self,
        cart_id: CartId,
        session_token: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        let cart = state.carts.get_mut(&cart_id).ok_or(StoreError::NotFound)?;
        cart.session_token = Some(session_token.to_owned());
        cart.updated_at = Utc::now();
        Ok(())
    }

    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, StoreError> {
        Ok(self.inner.lock().await.lines_of(cart_id))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.lock().await.orders.get(&id).cloned())
    }

    async fn find_order_by_tracking_code(
        &self,
        code: &str,
    ) -> Result<Option<Order>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state
            .orders
            .values()
            .find(|order| order.tracking_code == code)
            .cloned())
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state
            .order_lines
            .values()
            .filter(|line| line.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn count_orders(&self) -> Result<u64, StoreError> {
        Ok(self.inner.lock().await.orders.len() as u64)
    }

    async fn insert_user(&self, email: &Email) -> Result<UserId, StoreError> {
        let mut state = self.inner.lock().await;
        if state.users.values().any(|e| e == email) {
            return Err(StoreError::Conflict("email already exists".to_owned()));
        }
        let id = UserId::new(state.next_id());
        state.users.insert(id, email.clone());
        Ok(id)
    }

    async fn delete_user(&self, user_id: UserId) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if state.users.remove(&user_id).is_none() {
            return Err(StoreError::NotFound);
        }
        // Orders and carts degrade gracefully to anonymous ownership.
        for order in state.orders.values_mut() {
            if order.user_id == Some(user_id) {
                order.user_id = None;
            }
        }
        for cart in state.carts.values_mut() {
            if cart.user_id == Some(user_id) {
                cart.user_id = None;
            }
        }
        Ok(())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    staged: State,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        // The store-wide guard is already held; deduplicate and sort to
        // mirror the batched ordered lock of the Postgres backend.
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids
            .iter()
            .filter_map(|id| self.staged.products.get(id).cloned())
            .collect())
    }

    async fn decrement_stock(&mut self, id: ProductId, qty: u32) -> Result<u32, StoreError> {
        let product = self
            .staged
            .products
            .get_mut(&id)
            .ok_or(StoreError::NotFound)?;
        product.stock = product.stock.saturating_sub(qty);
        product.updated_at = Utc::now();
        Ok(product.stock)
    }

    async fn cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>, StoreError> {
        Ok(self.staged.lines_of(cart_id))
    }

    async fn upsert_cart_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<CartLine, StoreError> {
        let existing_id = self
            .staged
            .cart_lines
            .values()
            .find(|line| line.cart_id == cart_id && line.product_id == product_id)
            .map(|line| line.id);
        let id = existing_id.unwrap_or_else(|| CartLineId::new(self.staged.next_id()));
        let line = CartLine::new(id, cart_id, product_id, quantity, unit_price);
        self.staged.cart_lines.insert(id, line.clone());
        Ok(line)
    }

    async fn delete_cart_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        self.staged
            .cart_lines
            .retain(|_, line| !(line.cart_id == cart_id && line.product_id == product_id));
        Ok(())
    }

    async fn clear_cart_lines(&mut self, cart_id: CartId) -> Result<(), StoreError> {
        self.staged
            .cart_lines
            .retain(|_, line| line.cart_id != cart_id);
        Ok(())
    }

    async fn set_cart_total(
        &mut self,
        cart_id: CartId,
        total: Decimal,
    ) -> Result<(), StoreError> {
        let cart = self
            .staged
            .carts
            .get_mut(&cart_id)
            .ok_or(StoreError::NotFound)?;
        cart.total = total;
        cart.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, StoreError> {
        if self
            .staged
            .orders
            .values()
            .any(|o| o.tracking_code == order.tracking_code)
        {
            return Err(StoreError::Conflict(format!(
                "tracking code already exists: {}",
                order.tracking_code
            )));
        }
        let id = OrderId::new(self.staged.next_id());
        let (created_at, updated_at) = now_pair();
        let order = Order {
            id,
            tracking_code: order.tracking_code.clone(),
            user_id: order.user_id,
            contact_email: order.contact_email.clone(),
            total: order.total,
            status: order.status,
            shipping: order.shipping.clone(),
            payment_method: order.payment_method,
            created_at,
            updated_at,
        };
        self.staged.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn insert_order_line(&mut self, line: &NewOrderLine) -> Result<OrderLine, StoreError> {
        if !self.staged.products.contains_key(&line.product_id) {
            return Err(StoreError::NotFound);
        }
        let id = OrderLineId::new(self.staged.next_id());
        let order_line = OrderLine {
            id,
            order_id: line.order_id,
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal: line.subtotal(),
        };
        self.staged.order_lines.insert(id, order_line.clone());
        Ok(order_line)
    }

    async fn tracking_code_exists(&mut self, code: &str) -> Result<bool, StoreError> {
        Ok(self
            .staged
            .orders
            .values()
            .any(|order| order.tracking_code == code))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut guard = self.guard;
        *guard = self.staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn toy(name: &str, stock: u32) -> NewProduct {
        NewProduct {
            sku: format!("PF-{}", name.to_uppercase()),
            name: name.to_string(),
            short_description: String::new(),
            description: String::new(),
            price: dec!(5.00),
            stock,
            category: "Toys".to_string(),
            manufacturer: None,
        }
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        let product = store.insert_product(toy("rope", 4)).await.expect("insert");

        {
            let mut tx = store.begin().await.expect("begin");
            tx.decrement_stock(product.id, 3).await.expect("decrement");
            // dropped without commit
        }

        let fresh = store
            .get_product(product.id)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(fresh.stock, 4);
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let store = MemoryStore::new();
        let product = store.insert_product(toy("ball", 4)).await.expect("insert");

        let mut tx = store.begin().await.expect("begin");
        tx.decrement_stock(product.id, 3).await.expect("decrement");
        tx.commit().await.expect("commit");

        let fresh = store
            .get_product(product.id)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(fresh.stock, 1);
    }

    #[tokio::test]
    async fn decrement_clamps_at_zero() {
        let store = MemoryStore::new();
        let product = store.insert_product(toy("bone", 2)).await.expect("insert");

        let mut tx = store.begin().await.expect("begin");
        let stock = tx.decrement_stock(product.id, 99).await.expect("decrement");
        assert_eq!(stock, 0);
        tx.commit().await.expect("commit");
    }

    #[tokio::test]
    async fn upsert_replaces_the_line_for_a_product() {
        let store = MemoryStore::new();
        let product = store.insert_product(toy("mouse", 9)).await.expect("insert");
        let cart = store.create_cart(None, Some("tok")).await.expect("cart");

        let mut tx = store.begin().await.expect("begin");
        let first = tx
            .upsert_cart_line(cart.id, product.id, 2, dec!(5.00))
            .await
            .expect("upsert");
        let second = tx
            .upsert_cart_line(cart.id, product.id, 5, dec!(4.50))
            .await
            .expect("upsert");
        assert_eq!(first.id, second.id);
        assert_eq!(tx.cart_lines(cart.id).await.expect("lines").len(), 1);
        tx.commit().await.expect("commit");
    }

    #[tokio::test]
    async fn duplicate_sku_is_a_conflict() {
        let store = MemoryStore::new();
        store.insert_product(toy("twin", 1)).await.expect("insert");
        let err = store.insert_product(toy("twin", 1)).await.expect_err("dup");
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
