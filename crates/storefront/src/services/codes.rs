//! Tracking-code and SKU generation.
//!
//! Both follow the same shape: fixed prefix, random suffix from a
//! 36-symbol alphabet, a bounded number of uniqueness retries, then a
//! longer hex fallback that makes a collision practically impossible.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::db::{Store, StoreError, StoreTx};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const HEX_ALPHABET: &[u8] = b"0123456789ABCDEF";

const SUFFIX_LEN: usize = 8;
const FALLBACK_SUFFIX_LEN: usize = 12;
const MAX_ATTEMPTS: u32 = 5;

const TRACKING_PREFIX: &str = "PT";
const SKU_PREFIX: &str = "PF";

fn random_code(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(alphabet[rng.random_range(0..alphabet.len())]))
        .collect()
}

/// The `PT-YYYYMM-` prefix shared by every tracking code minted in a month.
#[must_use]
pub fn tracking_prefix(now: DateTime<Utc>) -> String {
    format!("{TRACKING_PREFIX}-{}-", now.format("%Y%m"))
}

/// Generate a tracking code unique among existing orders.
///
/// Checks uniqueness through the open transaction so the code is settled
/// before the order row is written. After [`MAX_ATTEMPTS`] collisions the
/// suffix widens to hex, at which point a clash would require a broken
/// random source.
///
/// # Errors
///
/// Returns error if the uniqueness lookup fails.
pub async fn generate_tracking_code(
    tx: &mut (dyn StoreTx + '_),
    now: DateTime<Utc>,
) -> Result<String, StoreError> {
    let prefix = tracking_prefix(now);
    for _ in 0..MAX_ATTEMPTS {
        let code = format!("{prefix}{}", random_code(CODE_ALPHABET, SUFFIX_LEN));
        if !tx.tracking_code_exists(&code).await? {
            return Ok(code);
        }
    }
    Ok(format!(
        "{prefix}{}",
        random_code(HEX_ALPHABET, FALLBACK_SUFFIX_LEN)
    ))
}

/// Generate a product SKU unique across the catalog. Same retry scheme as
/// tracking codes, without the time bucket.
///
/// # Errors
///
/// Returns error if the uniqueness lookup fails.
pub async fn generate_sku(store: &dyn Store) -> Result<String, StoreError> {
    for _ in 0..MAX_ATTEMPTS {
        let sku = format!("{SKU_PREFIX}-{}", random_code(CODE_ALPHABET, SUFFIX_LEN));
        if !store.sku_exists(&sku).await? {
            return Ok(sku);
        }
    }
    Ok(format!(
        "{SKU_PREFIX}-{}",
        random_code(HEX_ALPHABET, FALLBACK_SUFFIX_LEN)
    ))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::db::memory::MemoryStore;

    use super::*;

    #[test]
    fn alphabet_is_uppercase_alphanumeric() {
        assert_eq!(CODE_ALPHABET.len(), 36);
        assert!(
            CODE_ALPHABET
                .iter()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        );
    }

    #[test]
    fn prefix_embeds_year_and_month() {
        let march = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
        assert_eq!(tracking_prefix(march), "PT-202503-");
    }

    #[test]
    fn random_codes_draw_from_alphabet() {
        let code = random_code(CODE_ALPHABET, SUFFIX_LEN);
        assert_eq!(code.len(), SUFFIX_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[tokio::test]
    async fn tracking_codes_have_expected_shape() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();

        let code = generate_tracking_code(tx.as_mut(), now).await.unwrap();
        assert!(code.starts_with("PT-202507-"));
        assert_eq!(code.len(), "PT-202507-".len() + SUFFIX_LEN);
    }

    #[tokio::test]
    async fn skus_have_expected_shape() {
        let store = MemoryStore::new();
        let sku = generate_sku(&store).await.unwrap();
        assert!(sku.starts_with("PF-"));
        assert_eq!(sku.len(), 3 + SUFFIX_LEN);
    }
}
