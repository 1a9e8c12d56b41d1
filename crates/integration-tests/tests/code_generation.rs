//! Uniqueness properties of tracking codes and SKUs.

use std::collections::HashSet;

use chrono::Utc;
use petfun_integration_tests::harness;
use petfun_storefront::db::Store;
use petfun_storefront::services::codes;

#[tokio::test]
async fn a_thousand_tracking_codes_are_distinct() {
    let h = harness();
    let now = Utc::now();

    let mut seen = HashSet::new();
    let mut tx = h.store.begin().await.unwrap();
    for _ in 0..1000 {
        let code = codes::generate_tracking_code(tx.as_mut(), now).await.unwrap();
        assert!(seen.insert(code), "duplicate tracking code generated");
    }
}

#[tokio::test]
async fn a_thousand_skus_are_distinct() {
    let h = harness();

    let mut seen = HashSet::new();
    for _ in 0..1000 {
        let sku = codes::generate_sku(h.store.as_ref()).await.unwrap();
        assert!(seen.insert(sku), "duplicate sku generated");
    }
}

#[tokio::test]
async fn tracking_codes_embed_the_month_bucket() {
    let h = harness();
    let now = Utc::now();
    let prefix = codes::tracking_prefix(now);

    let mut tx = h.store.begin().await.unwrap();
    let code = codes::generate_tracking_code(tx.as_mut(), now).await.unwrap();
    assert!(code.starts_with(&prefix));

    let suffix = &code[prefix.len()..];
    assert_eq!(suffix.len(), 8);
    assert!(
        suffix
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    );
}
