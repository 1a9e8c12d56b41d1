//! End-to-end checkout scenarios without a payment gateway.

use petfun_core::{OrderStatus, PaymentMethod};
use petfun_integration_tests::{draft, harness, seed_product};
use petfun_storefront::db::Store;
use petfun_storefront::models::Principal;
use petfun_storefront::services::ConfirmOutcome;
use rust_decimal_macros::dec;

#[tokio::test]
async fn happy_path_places_order_and_empties_cart() {
    let h = harness();
    let product = seed_product(&h.store, "Pelota rebotadora", dec!(8.00), 10).await;

    let principal = Principal::anonymous("sess-happy");
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product.id, 2).await.unwrap();

    let setup = h
        .checkout
        .create_payment_intent(&cart, draft(PaymentMethod::Transfer))
        .await
        .unwrap();
    assert!(setup.client_secret.is_none());

    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let outcome = h.checkout.confirm(&cart, &setup.state).await.unwrap();

    let ConfirmOutcome::Placed(order) = outcome else {
        panic!("expected placed order");
    };
    assert_eq!(order.total, dec!(16.00));
    assert_eq!(order.status, OrderStatus::Received);
    assert!(order.tracking_code.starts_with("PT-"));

    // Cart emptied, stock decremented
    let view = h.carts.view(&cart).await.unwrap();
    assert!(view.is_empty());
    assert_eq!(view.total, dec!(0));

    let product = h.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 8);

    // Lines snapshot the product name and price
    let lines = h.store.order_lines(order.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].product_name, "Pelota rebotadora");
    assert_eq!(lines[0].quantity, 2);
    assert_eq!(lines[0].subtotal, dec!(16.00));
}

#[tokio::test]
async fn tracking_lookup_returns_the_order() {
    let h = harness();
    let product = seed_product(&h.store, "Caña con plumas", dec!(6.99), 5).await;

    let principal = Principal::anonymous("sess-track");
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product.id, 1).await.unwrap();

    let setup = h
        .checkout
        .create_payment_intent(&cart, draft(PaymentMethod::Transfer))
        .await
        .unwrap();
    let ConfirmOutcome::Placed(order) = h.checkout.confirm(&cart, &setup.state).await.unwrap()
    else {
        panic!("expected placed order");
    };

    let summary = h.checkout.track(&order.tracking_code).await.unwrap();
    assert_eq!(summary.tracking_code, order.tracking_code);
    assert_eq!(summary.total, dec!(6.99));
    assert_eq!(summary.lines.len(), 1);
    assert_eq!(summary.lines[0].product_name, "Caña con plumas");

    let missing = h.checkout.track("PT-000000-MISSING0").await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn confirm_on_empty_cart_fails() {
    let h = harness();
    let principal = Principal::anonymous("sess-empty");
    let cart = h.carts.resolve_cart(&principal).await.unwrap();

    let err = h.checkout.begin_checkout(&cart).await.unwrap_err();
    assert!(matches!(
        err,
        petfun_storefront::services::CheckoutError::EmptyCart
    ));
}

#[tokio::test]
async fn replayed_confirm_places_no_second_order() {
    let h = harness();
    let product = seed_product(&h.store, "Hueso de nylon", dec!(5.00), 6).await;

    let principal = Principal::anonymous("sess-replay");
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product.id, 2).await.unwrap();

    let setup = h
        .checkout
        .create_payment_intent(&cart, draft(PaymentMethod::Transfer))
        .await
        .unwrap();
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let ConfirmOutcome::Placed(_) = h.checkout.confirm(&cart, &setup.state).await.unwrap() else {
        panic!("expected placed order");
    };

    // A double submit re-runs confirm with the same state; the emptied
    // cart stops it before any order or stock mutation.
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let err = h.checkout.confirm(&cart, &setup.state).await.unwrap_err();
    assert!(matches!(
        err,
        petfun_storefront::services::CheckoutError::EmptyCart
    ));
    assert_eq!(h.store.count_orders().await.unwrap(), 1);
    let product = h.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 4);
}

#[tokio::test]
async fn order_survives_user_deletion_with_null_owner() {
    let h = harness();
    let product = seed_product(&h.store, "Ratón de fieltro", dec!(3.99), 9).await;

    let email = petfun_core::Email::parse("owner@example.com").unwrap();
    let user_id = h.store.insert_user(&email).await.unwrap();
    let principal = Principal::user(user_id, "sess-del");

    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product.id, 3).await.unwrap();

    let setup = h
        .checkout
        .create_payment_intent(&cart, draft(PaymentMethod::Transfer))
        .await
        .unwrap();
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let ConfirmOutcome::Placed(order) = h.checkout.confirm(&cart, &setup.state).await.unwrap()
    else {
        panic!("expected placed order");
    };
    assert_eq!(order.user_id, Some(user_id));

    h.store.delete_user(user_id).await.unwrap();

    let order = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.user_id, None);
    assert_eq!(order.total, dec!(11.97));
    let lines = h.store.order_lines(order.id).await.unwrap();
    assert_eq!(lines.len(), 1);
}
