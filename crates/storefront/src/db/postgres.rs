//! `PostgreSQL` storage backend.
//!
//! Queries bind at runtime (no compile-time database dependency). The
//! exclusive product lock is a single batched `SELECT ... FOR UPDATE` over
//! the sorted, deduplicated id set; ordering inside one statement prevents
//! lock-order deadlocks between checkouts with overlapping carts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use petfun_core::{CartId, Email, OrderId, ProductId, UserId};

use crate::models::{
    Cart, CartLine, NewOrder, NewOrderLine, NewProduct, Order, OrderLine, Product, ShippingAddress,
};

use super::{Store, StoreError, StoreTx};

/// `PostgreSQL` implementation of [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying pool (readiness checks, session store).
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    sku: String,
    name: String,
    short_description: String,
    description: String,
    price: Decimal,
    stock: i32,
    category: String,
    manufacturer: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self) -> Result<Product, StoreError> {
        let stock = u32::try_from(self.stock).map_err(|_| {
            StoreError::DataCorruption(format!("negative stock for product {}", self.id))
        })?;
        Ok(Product {
            id: ProductId::new(self.id),
            sku: self.sku,
            name: self.name,
            short_description: self.short_description,
            description: self.description,
            price: self.price,
            stock,
            category: self.category,
            manufacturer: self.manufacturer,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: i32,
    user_id: Option<i32>,
    session_token: Option<String>,
    total: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: CartId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            session_token: row.session_token,
            total: row.total,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: i32,
    cart_id: i32,
    product_id: i32,
    quantity: i32,
    unit_price: Decimal,
    subtotal: Decimal,
}

impl CartLineRow {
    fn into_line(self) -> Result<CartLine, StoreError> {
        let quantity = u32::try_from(self.quantity).map_err(|_| {
            StoreError::DataCorruption(format!("negative quantity on cart line {}", self.id))
        })?;
        Ok(CartLine {
            id: petfun_core::CartLineId::new(self.id),
            cart_id: CartId::new(self.cart_id),
            product_id: ProductId::new(self.product_id),
            quantity,
            unit_price: self.unit_price,
            subtotal: self.subtotal,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    tracking_code: String,
    user_id: Option<i32>,
    contact_email: String,
    total: Decimal,
    status: String,
    ship_name: String,
    ship_street: String,
    ship_number: String,
    ship_floor: String,
    ship_city: String,
    ship_postal_code: String,
    ship_country: String,
    payment_method: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, StoreError> {
        let contact_email = Email::parse(&self.contact_email).map_err(|e| {
            StoreError::DataCorruption(format!("invalid email on order {}: {e}", self.id))
        })?;
        let status = self.status.parse().map_err(StoreError::DataCorruption)?;
        let payment_method = self
            .payment_method
            .parse()
            .map_err(StoreError::DataCorruption)?;
        Ok(Order {
            id: OrderId::new(self.id),
            tracking_code: self.tracking_code,
            user_id: self.user_id.map(UserId::new),
            contact_email,
            total: self.total,
            status,
            shipping: ShippingAddress {
                name: self.ship_name,
                street: self.ship_street,
                number: self.ship_number,
                floor: self.ship_floor,
                city: self.ship_city,
                postal_code: self.ship_postal_code,
                country: self.ship_country,
            },
            payment_method,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
    subtotal: Decimal,
}

impl OrderLineRow {
    fn into_line(self) -> Result<OrderLine, StoreError> {
        let quantity = u32::try_from(self.quantity).map_err(|_| {
            StoreError::DataCorruption(format!("negative quantity on order line {}", self.id))
        })?;
        Ok(OrderLine {
            id: petfun_core::OrderLineId::new(self.id),
            order_id: OrderId::new(self.order_id),
            product_id: ProductId::new(self.product_id),
            product_name: self.product_name,
            quantity,
            unit_price: self.unit_price,
            subtotal: self.subtotal,
        })
    }
}

fn map_unique(e: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict(format!("{what} already exists"));
    }
    StoreError::Database(e)
}

const PRODUCT_COLUMNS: &str = "id, sku, name, short_description, description, price, stock, \
     category, manufacturer, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, tracking_code, user_id, contact_email, total, status, \
     ship_name, ship_street, ship_number, ship_floor, ship_city, ship_postal_code, \
     ship_country, payment_method, created_at, updated_at";

// =============================================================================
// Store
// =============================================================================

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx + '_>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;
        row.map(ProductRow::into_product).transpose()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO storefront.product \
             (sku, name, short_description, description, price, stock, category, manufacturer) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.short_description)
        .bind(&product.description)
        .bind(product.price)
        .bind(i32::try_from(product.stock).unwrap_or(i32::MAX))
        .bind(&product.category)
        .bind(&product.manufacturer)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "sku"))?;
        row.into_product()
    }

    async fn sku_exists(&self, sku: &str) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM storefront.product WHERE sku = $1)",
        )
        .bind(sku)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, session_token, total, created_at, updated_at \
             FROM storefront.cart WHERE id = $1",
        )
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Cart::from))
    }

    async fn find_cart_by_user(&self, user_id: UserId) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, session_token, total, created_at, updated_at \
             FROM storefront.cart WHERE user_id = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(user_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Cart::from))
    }

    async fn find_cart_by_session(&self, session_token: &str) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, session_token, total, created_at, updated_at \
             FROM storefront.cart \
             WHERE session_token = $1 AND user_id IS NULL \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Cart::from))
    }

    async fn create_cart(
        &self,
        user_id: Option<UserId>,
        session_token: Option<&str>,
    ) -> Result<Cart, StoreError> {
        let row = sqlx::query_as::<_, CartRow>(
            "INSERT INTO storefront.cart (user_id, session_token) VALUES ($1, $2) \
             RETURNING id, user_id, session_token, total, created_at, updated_at",
        )
        .bind(user_id.map(|id| id.as_i32()))
        .bind(session_token)
        .fetch_one(&self.pool)
        .await?;
        Ok(Cart::from(row))
    }

    async fn attach_session_token(
        &self,
        cart_id: CartId,
        session_token: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE storefront.cart SET session_token = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(session_token)
        .bind(cart_id.as_i32())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, StoreError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            "SELECT id, cart_id, product_id, quantity, unit_price, subtotal \
             FROM storefront.cart_line WHERE cart_id = $1 ORDER BY id",
        )
        .bind(cart_id.as_i32())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CartLineRow::into_line).collect()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.shop_order WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;
        row.map(OrderRow::into_order).transpose()
    }

    async fn find_order_by_tracking_code(
        &self,
        code: &str,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.shop_order WHERE tracking_code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(OrderRow::into_order).transpose()
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            "SELECT id, order_id, product_id, product_name, quantity, unit_price, subtotal \
             FROM storefront.order_line WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id.as_i32())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(OrderLineRow::into_line).collect()
    }

    async fn count_orders(&self) -> Result<u64, StoreError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM storefront.shop_order")
                .fetch_one(&self.pool)
                .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn insert_user(&self, email: &Email) -> Result<UserId, StoreError> {
        let id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO storefront.account (email) VALUES ($1) RETURNING id",
        )
        .bind(email.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "email"))?;
        Ok(UserId::new(id))
    }

    async fn delete_user(&self, user_id: UserId) -> Result<(), StoreError> {
        // ON DELETE SET NULL on cart and shop_order keeps their rows intact.
        let result = sqlx::query("DELETE FROM storefront.account WHERE id = $1")
            .bind(user_id.as_i32())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// Transaction
// =============================================================================

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let mut ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        ids.sort_unstable();
        ids.dedup();
        // One batched statement over the ordered id set; the locks are held
        // until this transaction commits or rolls back.
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product \
             WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    async fn decrement_stock(&mut self, id: ProductId, qty: u32) -> Result<u32, StoreError> {
        let stock = sqlx::query_scalar::<_, i32>(
            "UPDATE storefront.product \
             SET stock = GREATEST(stock - $2, 0), updated_at = NOW() \
             WHERE id = $1 RETURNING stock",
        )
        .bind(id.as_i32())
        .bind(i32::try_from(qty).unwrap_or(i32::MAX))
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(StoreError::NotFound)?;
        u32::try_from(stock)
            .map_err(|_| StoreError::DataCorruption(format!("negative stock for product {id}")))
    }

    async fn cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>, StoreError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            "SELECT id, cart_id, product_id, quantity, unit_price, subtotal \
             FROM storefront.cart_line WHERE cart_id = $1 ORDER BY id",
        )
        .bind(cart_id.as_i32())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(CartLineRow::into_line).collect()
    }

    async fn upsert_cart_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<CartLine, StoreError> {
        let subtotal = unit_price * Decimal::from(quantity);
        let row = sqlx::query_as::<_, CartLineRow>(
            "INSERT INTO storefront.cart_line \
             (cart_id, product_id, quantity, unit_price, subtotal) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (cart_id, product_id) DO UPDATE SET \
             quantity = EXCLUDED.quantity, unit_price = EXCLUDED.unit_price, \
             subtotal = EXCLUDED.subtotal \
             RETURNING id, cart_id, product_id, quantity, unit_price, subtotal",
        )
        .bind(cart_id.as_i32())
        .bind(product_id.as_i32())
        .bind(i32::try_from(quantity).unwrap_or(i32::MAX))
        .bind(unit_price)
        .bind(subtotal)
        .fetch_one(&mut *self.tx)
        .await?;
        row.into_line()
    }

    async fn delete_cart_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM storefront.cart_line WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id.as_i32())
            .bind(product_id.as_i32())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn clear_cart_lines(&mut self, cart_id: CartId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM storefront.cart_line WHERE cart_id = $1")
            .bind(cart_id.as_i32())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn set_cart_total(
        &mut self,
        cart_id: CartId,
        total: Decimal,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE storefront.cart SET total = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(total)
        .bind(cart_id.as_i32())
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO storefront.shop_order \
             (tracking_code, user_id, contact_email, total, status, ship_name, ship_street, \
              ship_number, ship_floor, ship_city, ship_postal_code, ship_country, \
              payment_method) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&order.tracking_code)
        .bind(order.user_id.map(|id| id.as_i32()))
        .bind(order.contact_email.as_str())
        .bind(order.total)
        .bind(order.status.to_string())
        .bind(&order.shipping.name)
        .bind(&order.shipping.street)
        .bind(&order.shipping.number)
        .bind(&order.shipping.floor)
        .bind(&order.shipping.city)
        .bind(&order.shipping.postal_code)
        .bind(&order.shipping.country)
        .bind(order.payment_method.to_string())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_unique(e, "tracking code"))?;
        row.into_order()
    }

    async fn insert_order_line(&mut self, line: &NewOrderLine) -> Result<OrderLine, StoreError> {
        let row = sqlx::query_as::<_, OrderLineRow>(
            "INSERT INTO storefront.order_line \
             (order_id, product_id, product_name, quantity, unit_price, subtotal) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, order_id, product_id, product_name, quantity, unit_price, subtotal",
        )
        .bind(line.order_id.as_i32())
        .bind(line.product_id.as_i32())
        .bind(&line.product_name)
        .bind(i32::try_from(line.quantity).unwrap_or(i32::MAX))
        .bind(line.unit_price)
        .bind(line.subtotal())
        .fetch_one(&mut *self.tx)
        .await?;
        row.into_line()
    }

    async fn tracking_code_exists(&mut self, code: &str) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM storefront.shop_order WHERE tracking_code = $1)",
        )
        .bind(code)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
