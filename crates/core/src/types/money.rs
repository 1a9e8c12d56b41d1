//! Money helpers for decimal prices.
//!
//! Prices and totals are carried as [`rust_decimal::Decimal`] with two
//! fractional digits. The payment gateway speaks integer minor units
//! (cents), so conversion rounds half away from zero: `12.00` EUR is
//! `1200` minor units.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Convert a decimal amount into integer minor units (cents).
///
/// Computed as `round(amount * 100)` with midpoint rounding away from zero.
/// Amounts outside the `i64` range saturate, which in practice never happens
/// for order totals.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> i64 {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// Convert integer minor units (cents) back into a decimal amount.
#[must_use]
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn whole_amounts() {
        assert_eq!(to_minor_units(dec!(12.00)), 1200);
        assert_eq!(to_minor_units(dec!(0)), 0);
    }

    #[test]
    fn fractional_amounts() {
        assert_eq!(to_minor_units(dec!(7.99)), 799);
        assert_eq!(to_minor_units(dec!(16.00)), 1600);
    }

    #[test]
    fn midpoints_round_away_from_zero() {
        assert_eq!(to_minor_units(dec!(0.005)), 1);
        assert_eq!(to_minor_units(dec!(0.015)), 2);
    }

    #[test]
    fn minor_units_round_trip() {
        assert_eq!(from_minor_units(2400), dec!(24.00));
        assert_eq!(to_minor_units(from_minor_units(2301)), 2301);
    }
}
