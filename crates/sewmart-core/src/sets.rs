//! Product-set (bundle) price decomposition.
//!
//! A set sells at its own price, but order lines are written per
//! constituent product, so the set price has to be split across the
//! constituents. The split is weighted by each constituent's retail
//! value and must reconstruct the set price to the kopeck: every line
//! is floored to kopecks first and the rounding remainder is then dealt
//! out one kopeck at a time, heaviest line first.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::CoreError;

const KOPECK: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// One constituent of a product set, as priced on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetConstituent {
    pub product_id: i64,
    /// Effective retail unit price of the constituent outside the set.
    pub unit_price: Decimal,
    /// How many units of this product one set contains.
    pub quantity: u32,
}

impl SetConstituent {
    fn weight(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Splits `set_price` into one line total per constituent (for a single
/// set unit), proportional to each constituent's retail value.
///
/// Invariant: the returned totals sum to `set_price` exactly and appear
/// in the same order as `constituents`. When every weight is zero the
/// price is split equally instead.
///
/// # Errors
///
/// - [`CoreError::EmptySet`] when `constituents` is empty.
/// - [`CoreError::NegativeSetPrice`] when `set_price` is negative.
/// - [`CoreError::InvalidPricing`] when a constituent price is negative.
pub fn decompose_set_price(
    set_price: Decimal,
    constituents: &[SetConstituent],
) -> Result<Vec<Decimal>, CoreError> {
    if constituents.is_empty() {
        return Err(CoreError::EmptySet);
    }
    if set_price < Decimal::ZERO {
        return Err(CoreError::NegativeSetPrice(set_price));
    }
    if constituents.iter().any(|c| c.unit_price < Decimal::ZERO) {
        return Err(CoreError::InvalidPricing(
            "negative constituent price in set".into(),
        ));
    }

    let total_weight: Decimal = constituents.iter().map(SetConstituent::weight).sum();

    let mut shares: Vec<Decimal> = if total_weight > Decimal::ZERO {
        constituents
            .iter()
            .map(|c| {
                (set_price * c.weight() / total_weight)
                    .round_dp_with_strategy(2, RoundingStrategy::ToZero)
            })
            .collect()
    } else {
        // Free constituents only (promo inserts, gifts): split equally.
        let n = Decimal::from(constituents.len());
        let each = (set_price / n).round_dp_with_strategy(2, RoundingStrategy::ToZero);
        vec![each; constituents.len()]
    };

    // Deal out the flooring remainder, heaviest line first, cycling. The
    // remainder is bounded by one kopeck per line per pass, so this
    // terminates quickly.
    let mut remainder = set_price - shares.iter().copied().sum::<Decimal>();
    if remainder > Decimal::ZERO {
        let mut order: Vec<usize> = (0..constituents.len()).collect();
        order.sort_by(|&a, &b| {
            constituents[b]
                .weight()
                .cmp(&constituents[a].weight())
                .then(a.cmp(&b))
        });
        'deal: loop {
            for &idx in &order {
                if remainder <= Decimal::ZERO {
                    break 'deal;
                }
                let step = remainder.min(KOPECK);
                shares[idx] += step;
                remainder -= step;
            }
        }
    }

    Ok(shares)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("decimal literal")
    }

    fn part(id: i64, price: &str, qty: u32) -> SetConstituent {
        SetConstituent {
            product_id: id,
            unit_price: dec(price),
            quantity: qty,
        }
    }

    fn assert_reconstructs(set_price: &str, constituents: &[SetConstituent]) -> Vec<Decimal> {
        let shares =
            decompose_set_price(dec(set_price), constituents).expect("decomposition succeeds");
        let sum: Decimal = shares.iter().copied().sum();
        assert_eq!(sum, dec(set_price), "line totals must rebuild the set price");
        assert!(shares.iter().all(|s| *s >= Decimal::ZERO));
        shares
    }

    #[test]
    fn proportional_split_without_remainder() {
        let shares = assert_reconstructs(
            "1000",
            &[part(1, "750", 1), part(2, "250", 1)],
        );
        assert_eq!(shares, vec![dec("750.00"), dec("250.00")]);
    }

    #[test]
    fn remainder_goes_to_the_heaviest_line() {
        // 100 / 3 equal constituents: 33.33 each, 0.01 left over.
        let shares = assert_reconstructs(
            "100",
            &[part(1, "10", 1), part(2, "10", 1), part(3, "10", 1)],
        );
        assert_eq!(shares, vec![dec("33.34"), dec("33.33"), dec("33.33")]);
    }

    #[test]
    fn quantities_weight_the_split() {
        // Machine (1 x 9000) + two needle packs (2 x 500): weights 9000/1000.
        let shares = assert_reconstructs("9000", &[part(1, "9000", 1), part(2, "500", 2)]);
        assert_eq!(shares, vec![dec("8100.00"), dec("900.00")]);
    }

    #[test]
    fn uneven_weights_still_reconstruct_exactly() {
        let shares = assert_reconstructs(
            "9999.97",
            &[part(1, "6990", 1), part(2, "1490.50", 2), part(3, "99.99", 3)],
        );
        assert_eq!(shares.len(), 3);
        // Heaviest constituent carries the largest share.
        assert!(shares[0] > shares[1] && shares[1] > shares[2]);
    }

    #[test]
    fn zero_weights_split_equally() {
        let shares = assert_reconstructs("10.01", &[part(1, "0", 1), part(2, "0", 1)]);
        assert_eq!(shares, vec![dec("5.01"), dec("5.00")]);
    }

    #[test]
    fn zero_set_price_yields_zero_lines() {
        let shares = assert_reconstructs("0", &[part(1, "100", 1), part(2, "50", 1)]);
        assert!(shares.iter().all(|s| s.is_zero()));
    }

    #[test]
    fn single_constituent_takes_everything() {
        let shares = assert_reconstructs("123.45", &[part(1, "99", 2)]);
        assert_eq!(shares, vec![dec("123.45")]);
    }

    #[test]
    fn empty_set_is_an_error() {
        assert!(matches!(
            decompose_set_price(dec("100"), &[]),
            Err(CoreError::EmptySet)
        ));
    }

    #[test]
    fn negative_set_price_is_an_error() {
        assert!(matches!(
            decompose_set_price(dec("-1"), &[part(1, "10", 1)]),
            Err(CoreError::NegativeSetPrice(_))
        ));
    }

    #[test]
    fn negative_constituent_price_is_an_error() {
        assert!(decompose_set_price(dec("100"), &[part(1, "-10", 1)]).is_err());
    }

    #[test]
    fn output_order_matches_input_order() {
        // Lightest first on input; shares must not be reordered.
        let shares = assert_reconstructs("100", &[part(1, "10", 1), part(2, "90", 1)]);
        assert_eq!(shares, vec![dec("10.00"), dec("90.00")]);
    }
}
