//! The oversell race: two checkouts competing for the same stock.

use std::sync::Arc;

use petfun_core::PaymentMethod;
use petfun_integration_tests::{Harness, draft, harness, seed_product};
use petfun_storefront::db::Store;
use petfun_storefront::models::{CheckoutState, Principal};
use petfun_storefront::services::ConfirmOutcome;
use rust_decimal_macros::dec;

async fn prepared_cart(
    h: &Harness,
    session: &str,
    product_id: petfun_core::ProductId,
    qty: i64,
) -> (petfun_storefront::models::Cart, CheckoutState) {
    let principal = Principal::anonymous(session);
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product_id, qty).await.unwrap();
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let setup = h
        .checkout
        .create_payment_intent(&cart, draft(PaymentMethod::Transfer))
        .await
        .unwrap();
    (cart, setup.state)
}

#[tokio::test]
async fn combined_demand_over_stock_never_oversells() {
    let h = Arc::new(harness());
    // Stock 3; each buyer wants 2: only one can get the full quantity.
    let product = seed_product(&h.store, "Mordedor resistente", dec!(7.99), 3).await;

    let (cart_a, state_a) = prepared_cart(&h, "sess-race-a", product.id, 2).await;
    let (cart_b, state_b) = prepared_cart(&h, "sess-race-b", product.id, 2).await;

    let ha = Arc::clone(&h);
    let hb = Arc::clone(&h);
    let task_a =
        tokio::spawn(async move { ha.checkout.confirm(&cart_a, &state_a).await.unwrap() });
    let task_b =
        tokio::spawn(async move { hb.checkout.confirm(&cart_b, &state_b).await.unwrap() });

    let outcome_a = task_a.await.unwrap();
    let outcome_b = task_b.await.unwrap();

    let placed = [&outcome_a, &outcome_b]
        .iter()
        .filter(|o| matches!(o, ConfirmOutcome::Placed(_)))
        .count();
    let adjusted = [&outcome_a, &outcome_b]
        .iter()
        .filter(|o| matches!(o, ConfirmOutcome::Adjusted { .. }))
        .count();

    // Exactly one wins outright; the loser is adjusted, never placed over
    // the remaining stock.
    assert_eq!(placed, 1);
    assert_eq!(adjusted, 1);

    let product = h.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 1);
    assert_eq!(h.store.count_orders().await.unwrap(), 1);
}

#[tokio::test]
async fn loser_can_place_the_adjusted_remainder() {
    let h = Arc::new(harness());
    let product = seed_product(&h.store, "Pelota resistente XL", dec!(8.90), 3).await;

    let (cart_a, state_a) = prepared_cart(&h, "sess-rem-a", product.id, 2).await;
    let (cart_b, state_b) = prepared_cart(&h, "sess-rem-b", product.id, 2).await;

    let first = h.checkout.confirm(&cart_a, &state_a).await.unwrap();
    assert!(matches!(first, ConfirmOutcome::Placed(_)));

    let second = h.checkout.confirm(&cart_b, &state_b).await.unwrap();
    let ConfirmOutcome::Adjusted { cart_emptied, .. } = second else {
        panic!("expected adjustment");
    };
    assert!(!cart_emptied);

    // The corrected cart holds the single remaining unit; confirming again
    // with fresh checkout state succeeds.
    let principal = Principal::anonymous("sess-rem-b");
    let cart_b = h.carts.resolve_cart(&principal).await.unwrap();
    let setup = h
        .checkout
        .create_payment_intent(&cart_b, draft(PaymentMethod::Transfer))
        .await
        .unwrap();
    let retry = h.checkout.confirm(&cart_b, &setup.state).await.unwrap();
    let ConfirmOutcome::Placed(order) = retry else {
        panic!("expected placed order");
    };
    assert_eq!(order.total, dec!(8.90));

    let product = h.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 0);
    assert_eq!(h.store.count_orders().await.unwrap(), 2);
}

#[tokio::test]
async fn decrement_clamps_at_zero() {
    let h = harness();
    let product = seed_product(&h.store, "Ratón con catnip", dec!(4.20), 2).await;

    let mut tx = h.store.begin().await.unwrap();
    let stock = tx.decrement_stock(product.id, 99).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(stock, 0);
    let product = h.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 0);
}
