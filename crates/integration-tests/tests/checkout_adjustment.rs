//! Cart reconciliation against live stock at confirm time.

use petfun_core::PaymentMethod;
use petfun_integration_tests::{draft, harness, seed_product};
use petfun_storefront::db::Store;
use petfun_storefront::models::Principal;
use petfun_storefront::services::ConfirmOutcome;
use rust_decimal_macros::dec;

#[tokio::test]
async fn stock_drop_clamps_the_line_and_aborts_the_order() {
    let h = harness();
    let product = seed_product(&h.store, "Pelota luminosa", dec!(6.90), 2).await;

    let principal = Principal::anonymous("sess-clamp");
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product.id, 2).await.unwrap();

    let setup = h
        .checkout
        .create_payment_intent(&cart, draft(PaymentMethod::Transfer))
        .await
        .unwrap();

    // Another buyer takes one unit between add-to-cart and confirm.
    let mut tx = h.store.begin().await.unwrap();
    tx.decrement_stock(product.id, 1).await.unwrap();
    tx.commit().await.unwrap();

    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let outcome = h.checkout.confirm(&cart, &setup.state).await.unwrap();

    let ConfirmOutcome::Adjusted {
        notes,
        cart_emptied,
    } = outcome
    else {
        panic!("expected adjustment");
    };
    assert_eq!(notes.len(), 1);
    assert!(!cart_emptied);

    // The correction is committed: line clamped to 1, total recomputed.
    let view = h.carts.view(&cart).await.unwrap();
    assert_eq!(view.lines[0].quantity, 1);
    assert_eq!(view.total, dec!(6.90));

    // No order, no decrement beyond the competing purchase.
    assert_eq!(h.store.count_orders().await.unwrap(), 0);
    let product = h.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 1);
}

#[tokio::test]
async fn sold_out_product_empties_the_cart() {
    let h = harness();
    let product = seed_product(&h.store, "Set de 3 ratones", dec!(6.80), 2).await;

    let principal = Principal::anonymous("sess-soldout");
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product.id, 2).await.unwrap();

    let setup = h
        .checkout
        .create_payment_intent(&cart, draft(PaymentMethod::Transfer))
        .await
        .unwrap();

    let mut tx = h.store.begin().await.unwrap();
    tx.decrement_stock(product.id, 2).await.unwrap();
    tx.commit().await.unwrap();

    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let ConfirmOutcome::Adjusted {
        notes,
        cart_emptied,
    } = h.checkout.confirm(&cart, &setup.state).await.unwrap()
    else {
        panic!("expected adjustment");
    };

    assert_eq!(notes.len(), 1);
    assert!(cart_emptied);
    let view = h.carts.view(&cart).await.unwrap();
    assert!(view.is_empty());
    assert_eq!(h.store.count_orders().await.unwrap(), 0);
}

#[tokio::test]
async fn price_change_alone_is_not_an_adjustment() {
    let h = harness();
    let product = seed_product(&h.store, "Caña telescópica", dec!(7.99), 5).await;

    let principal = Principal::anonymous("sess-reprice");
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product.id, 2).await.unwrap();

    let setup = h
        .checkout
        .create_payment_intent(&cart, draft(PaymentMethod::Transfer))
        .await
        .unwrap();

    // Catalog price rises before confirm.
    h.store.set_product_price(product.id, dec!(9.99)).await;

    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let ConfirmOutcome::Placed(order) = h.checkout.confirm(&cart, &setup.state).await.unwrap()
    else {
        panic!("expected placed order");
    };

    // The order snapshots the current price, silently.
    assert_eq!(order.total, dec!(19.98));
    let lines = h.store.order_lines(order.id).await.unwrap();
    assert_eq!(lines[0].unit_price, dec!(9.99));
}
