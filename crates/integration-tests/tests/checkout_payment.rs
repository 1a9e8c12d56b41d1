//! Card-payment verification and capture scenarios against the scripted
//! gateway.

use petfun_core::PaymentMethod;
use petfun_integration_tests::{ScriptedGateway, draft, harness, harness_with_gateway, seed_product};
use petfun_storefront::db::Store;
use petfun_storefront::models::Principal;
use petfun_storefront::payments::IntentStatus;
use petfun_storefront::services::{CheckoutError, ConfirmOutcome};
use rust_decimal_macros::dec;

#[tokio::test]
async fn amount_mismatch_aborts_without_an_order() {
    let gateway = ScriptedGateway::new(IntentStatus::RequiresCapture);
    let h = harness_with_gateway(gateway.clone());
    let product = seed_product(&h.store, "Puzzle canino", dec!(12.00), 5).await;

    let principal = Principal::anonymous("sess-mismatch");
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product.id, 2).await.unwrap();

    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let setup = h
        .checkout
        .create_payment_intent(&cart, draft(PaymentMethod::Card))
        .await
        .unwrap();
    assert_eq!(setup.client_secret.as_deref(), Some("pi_scripted_secret"));

    // 2 x 12.00 authorizes 2400 minor units; the gateway claims 2300.
    gateway.override_amount(2300);

    let err = h.checkout.confirm(&cart, &setup.state).await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::PaymentAmountMismatch {
            expected: 2400,
            actual: 2300,
        }
    ));

    assert_eq!(h.store.count_orders().await.unwrap(), 0);
    assert!(gateway.captures().is_empty());

    // No state mutation: cart and stock untouched
    let view = h.carts.view(&cart).await.unwrap();
    assert_eq!(view.total, dec!(24.00));
    let product = h.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 5);
}

#[tokio::test]
async fn requires_capture_is_captured_on_confirm() {
    let gateway = ScriptedGateway::new(IntentStatus::RequiresCapture);
    let h = harness_with_gateway(gateway.clone());
    let product = seed_product(&h.store, "Túnel plegable", dec!(14.99), 3).await;

    let principal = Principal::anonymous("sess-capture");
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product.id, 1).await.unwrap();

    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let setup = h
        .checkout
        .create_payment_intent(&cart, draft(PaymentMethod::Card))
        .await
        .unwrap();

    let outcome = h.checkout.confirm(&cart, &setup.state).await.unwrap();
    assert!(matches!(outcome, ConfirmOutcome::Placed(_)));
    assert_eq!(gateway.captures(), vec!["pi_scripted".to_string()]);
}

#[tokio::test]
async fn already_succeeded_intent_is_left_untouched() {
    let gateway = ScriptedGateway::new(IntentStatus::Succeeded);
    let h = harness_with_gateway(gateway.clone());
    let product = seed_product(&h.store, "Spray catnip", dec!(5.20), 4).await;

    let principal = Principal::anonymous("sess-succeeded");
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product.id, 1).await.unwrap();

    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let setup = h
        .checkout
        .create_payment_intent(&cart, draft(PaymentMethod::Card))
        .await
        .unwrap();

    let outcome = h.checkout.confirm(&cart, &setup.state).await.unwrap();
    assert!(matches!(outcome, ConfirmOutcome::Placed(_)));
    assert!(gateway.captures().is_empty());
}

#[tokio::test]
async fn unconfirmed_intent_aborts_before_the_transaction() {
    let gateway = ScriptedGateway::new(IntentStatus::Processing);
    let h = harness_with_gateway(gateway);
    let product = seed_product(&h.store, "Mordedor cuerda", dec!(7.20), 6).await;

    let principal = Principal::anonymous("sess-notready");
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product.id, 1).await.unwrap();

    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let setup = h
        .checkout
        .create_payment_intent(&cart, draft(PaymentMethod::Card))
        .await
        .unwrap();

    let err = h.checkout.confirm(&cart, &setup.state).await.unwrap_err();
    assert!(matches!(err, CheckoutError::PaymentNotReady { .. }));
    assert_eq!(h.store.count_orders().await.unwrap(), 0);
}

#[tokio::test]
async fn capture_failure_aborts_without_an_order() {
    let gateway = ScriptedGateway::new(IntentStatus::RequiresCapture);
    let h = harness_with_gateway(gateway.clone());
    let product = seed_product(&h.store, "Peluche sin relleno", dec!(10.50), 6).await;

    let principal = Principal::anonymous("sess-capfail");
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product.id, 1).await.unwrap();

    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let setup = h
        .checkout
        .create_payment_intent(&cart, draft(PaymentMethod::Card))
        .await
        .unwrap();
    gateway.fail_capture();

    let err = h.checkout.confirm(&cart, &setup.state).await.unwrap_err();
    assert!(matches!(err, CheckoutError::PaymentCaptureFailed));
    assert_eq!(h.store.count_orders().await.unwrap(), 0);
    let product = h.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 6);
}

#[tokio::test]
async fn missing_intent_handle_is_rejected() {
    let gateway = ScriptedGateway::new(IntentStatus::Succeeded);
    let h = harness_with_gateway(gateway);
    let product = seed_product(&h.store, "Hierba gatera", dec!(4.50), 8).await;

    let principal = Principal::anonymous("sess-nointent");
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product.id, 1).await.unwrap();

    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let d = draft(PaymentMethod::Card);
    let state = petfun_storefront::models::CheckoutState::new(
        d.contact_email,
        d.shipping,
        d.payment_method,
    );

    let err = h.checkout.confirm(&cart, &state).await.unwrap_err();
    assert!(matches!(err, CheckoutError::PaymentSessionMissing));
}

#[tokio::test]
async fn card_payment_without_a_gateway_fails_at_the_payment_step() {
    let h = harness();
    let product = seed_product(&h.store, "Collar reflectante", dec!(7.50), 4).await;

    let principal = Principal::anonymous("sess-nogateway");
    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    h.carts.add_line(&cart, product.id, 1).await.unwrap();

    let cart = h.carts.resolve_cart(&principal).await.unwrap();
    let err = h
        .checkout
        .create_payment_intent(&cart, draft(PaymentMethod::Card))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::GatewayUnconfigured));
}
