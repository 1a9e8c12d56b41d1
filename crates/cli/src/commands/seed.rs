//! Demo data seeding.
//!
//! Inserts the demo toy catalog, then a dozen demo orders so the tracking
//! page has something to show. Seeded SKUs are fixed so repeated runs
//! detect existing rows and skip them; demo orders are only created into an
//! empty order table.

use std::sync::Arc;

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use petfun_core::{Email, OrderStatus, PaymentMethod};
use petfun_storefront::db::{Store, StoreError, create_pool, postgres::PgStore};
use petfun_storefront::models::{NewOrder, NewOrderLine, NewProduct, Product, ShippingAddress};

struct SeedRow {
    sku: &'static str,
    name: &'static str,
    category: &'static str,
    price: Decimal,
    stock: u32,
    manufacturer: &'static str,
}

fn demo_catalog() -> Vec<SeedRow> {
    let row = |sku, name, category, price, stock, manufacturer| SeedRow {
        sku,
        name,
        category,
        price,
        stock,
        manufacturer,
    };
    vec![
        row("DOG-MOR-001", "Mordedor resistente", "Mordedores", dec!(7.99), 25, "PetMaster"),
        row("DOG-MOR-002", "Mordedor con sabor", "Mordedores", dec!(8.50), 18, "CaninePlay"),
        row("DOG-MOR-003", "Mordedor dental", "Mordedores", dec!(6.50), 30, "PetMaster"),
        row("DOG-MOR-004", "Mordedor cuerda", "Mordedores", dec!(7.20), 22, "CaninePlay"),
        row("DOG-PEL-001", "Pelota rebotadora", "Pelotas", dec!(5.49), 40, "CaninePlay"),
        row("DOG-PEL-002", "Pelota luminosa", "Pelotas", dec!(6.90), 28, "CaninePlay"),
        row("DOG-PEL-003", "Pelota resistente XL", "Pelotas", dec!(8.90), 15, "PetMaster"),
        row("DOG-INT-001", "Puzzle canino nivel 1", "De inteligencia", dec!(19.90), 10, "PetMaster"),
        row("DOG-INT-002", "Puzzle canino nivel 2", "De inteligencia", dec!(24.90), 8, "PetMaster"),
        row("DOG-PELUC-001", "Peluchito con sonido", "Peluches", dec!(12.00), 12, "CaninePlay"),
        row("DOG-PELUC-002", "Peluche sin relleno", "Peluches", dec!(10.50), 18, "CaninePlay"),
        row("CAT-RAT-001", "Ratón de fieltro", "Ratones de juguete", dec!(3.99), 50, "FelineJoy"),
        row("CAT-RAT-002", "Ratón con catnip", "Ratones de juguete", dec!(4.20), 45, "FelineJoy"),
        row("CAT-RAT-003", "Set de 3 ratones", "Ratones de juguete", dec!(6.80), 32, "CatCraft"),
        row("CAT-CAN-001", "Caña con plumas", "Caña", dec!(6.99), 35, "CatCraft"),
        row("CAT-CAN-002", "Caña telescópica", "Caña", dec!(7.99), 20, "CatCraft"),
        row("CAT-HIER-001", "Hierba gatera premium", "Hierba gatera", dec!(4.50), 60, "FelineJoy"),
        row("CAT-HIER-002", "Spray catnip", "Hierba gatera", dec!(5.20), 26, "FelineJoy"),
        row("CAT-TUN-001", "Túnel plegable", "Túneles", dec!(14.99), 14, "CatCraft"),
        row("CAT-TUN-002", "Túnel con ventana", "Túneles", dec!(16.50), 12, "CatCraft"),
    ]
}

/// Seed the demo catalog.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;
    let pool = create_pool(&database_url).await?;
    let store = Arc::new(PgStore::new(pool));

    let mut inserted = 0u32;
    let mut products = Vec::new();
    for row in demo_catalog() {
        if store.sku_exists(row.sku).await? {
            continue;
        }
        let product = store
            .insert_product(NewProduct {
                sku: row.sku.to_string(),
                name: row.name.to_string(),
                short_description: String::new(),
                description: format!("{} para tu mascota.", row.name),
                price: row.price,
                stock: row.stock,
                category: row.category.to_string(),
                manufacturer: Some(row.manufacturer.to_string()),
            })
            .await?;
        products.push(product);
        inserted += 1;
    }
    info!(inserted, "Catalog seeding complete");

    let orders = seed_demo_orders(store.as_ref(), &products).await?;
    info!(orders, "Order seeding complete");

    Ok(())
}

/// Seed demo orders for the tracking page, one to three lines each.
///
/// Only runs against an empty order table, and only when this invocation
/// inserted catalog rows to reference.
async fn seed_demo_orders(store: &PgStore, products: &[Product]) -> Result<u32, StoreError> {
    if products.is_empty() || store.count_orders().await? > 0 {
        return Ok(0);
    }

    let statuses = [
        OrderStatus::Received,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Canceled,
    ];

    let contact_email =
        Email::parse("demo-tracking@example.com").map_err(|e| StoreError::DataCorruption(e.to_string()))?;

    for i in 0..12u32 {
        // Pick lines up front so the order header carries its final total.
        let (status, picks) = {
            let mut rng = rand::rng();
            let status = statuses[rng.random_range(0..statuses.len())];
            let picks: Vec<(usize, u32)> = (0..rng.random_range(1..=3usize))
                .map(|_| (rng.random_range(0..products.len()), rng.random_range(1..=3u32)))
                .collect();
            (status, picks)
        };
        let total: Decimal = picks
            .iter()
            .map(|&(idx, quantity)| products[idx].price * Decimal::from(quantity))
            .sum();

        let mut tx = store.begin().await?;
        let order = tx
            .insert_order(&NewOrder {
                tracking_code: format!("PT-DEMO-{i:03}"),
                user_id: None,
                contact_email: contact_email.clone(),
                total,
                status,
                shipping: ShippingAddress {
                    name: format!("Cliente {i}"),
                    street: format!("Calle Demo {i}"),
                    number: (10 + i).to_string(),
                    floor: String::new(),
                    city: "Ciudad".to_string(),
                    postal_code: format!("28{}", 100 + i),
                    country: "ES".to_string(),
                },
                payment_method: PaymentMethod::Card,
            })
            .await?;

        for (idx, quantity) in picks {
            let product = &products[idx];
            tx.insert_order_line(&NewOrderLine {
                order_id: order.id,
                product_id: product.id,
                product_name: product.name.clone(),
                quantity,
                unit_price: product.price,
            })
            .await?;
        }

        tx.commit().await?;
    }

    Ok(12)
}
