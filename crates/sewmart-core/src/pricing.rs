//! Effective price computation for catalog products.
//!
//! A product carries a base price in its quote currency, a wholesale
//! price, a percentage discount capped by a per-product maximum, and a
//! flat rouble discount. All arithmetic is done in [`Decimal`] so totals
//! reconcile to the kopeck.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Which price list a buyer is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Retail,
    Wholesale,
}

impl PriceTier {
    /// Stable lowercase identifier, used for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retail => "retail",
            Self::Wholesale => "wholesale",
        }
    }
}

impl std::str::FromStr for PriceTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retail" => Ok(Self::Retail),
            "wholesale" => Ok(Self::Wholesale),
            other => Err(CoreError::UnknownPriceTier(other.to_string())),
        }
    }
}

/// Pricing fields of a single catalog product.
///
/// `price` and `ws_price` are quoted in the product's currency;
/// `currency_rate` converts to roubles (1 for rouble-priced goods).
/// Discount fields apply to the retail tier only: the wholesale price is
/// already negotiated and bypasses both discount regimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPricing {
    pub price: Decimal,
    pub ws_price: Decimal,
    pub currency_rate: Decimal,
    pub discount_percent: Decimal,
    pub max_discount_percent: Decimal,
    pub discount_rub: Decimal,
}

impl ProductPricing {
    /// Rouble pricing with no discounts, for fixtures and simple goods.
    #[must_use]
    pub fn flat(price: Decimal) -> Self {
        Self {
            price,
            ws_price: price,
            currency_rate: Decimal::ONE,
            discount_percent: Decimal::ZERO,
            max_discount_percent: Decimal::ZERO,
            discount_rub: Decimal::ZERO,
        }
    }

    /// Rejects pricing rows that cannot produce a meaningful price.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPricing`] when any money field is
    /// negative, the rate is not positive, or the percentage fields are
    /// outside `0..=100`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.price < Decimal::ZERO || self.ws_price < Decimal::ZERO {
            return Err(CoreError::InvalidPricing("negative base price".into()));
        }
        if self.currency_rate <= Decimal::ZERO {
            return Err(CoreError::InvalidPricing(format!(
                "currency rate must be positive, got {}",
                self.currency_rate
            )));
        }
        let hundred = Decimal::ONE_HUNDRED;
        if self.discount_percent < Decimal::ZERO
            || self.discount_percent > hundred
            || self.max_discount_percent < Decimal::ZERO
            || self.max_discount_percent > hundred
        {
            return Err(CoreError::InvalidPricing(
                "discount percentages must be within 0..=100".into(),
            ));
        }
        if self.discount_rub < Decimal::ZERO {
            return Err(CoreError::InvalidPricing("negative rouble discount".into()));
        }
        Ok(())
    }

    /// Undiscounted rouble price for the tier.
    ///
    /// Foreign-currency prices are converted at `currency_rate` and
    /// rounded half-up to whole roubles, the catalog display convention
    /// for imported machines.
    #[must_use]
    pub fn base_price(&self, tier: PriceTier) -> Decimal {
        let quoted = match tier {
            PriceTier::Retail => self.price,
            PriceTier::Wholesale => self.ws_price,
        };
        (quoted * self.currency_rate)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Percentage actually applied at checkout: the product discount plus
    /// any extra (promo code, customer discount), capped by
    /// `max_discount_percent`.
    #[must_use]
    pub fn applied_percent(&self, extra_percent: Decimal) -> Decimal {
        (self.discount_percent + extra_percent.max(Decimal::ZERO))
            .min(self.max_discount_percent)
            .max(Decimal::ZERO)
    }

    /// Effective per-unit rouble price for the tier.
    ///
    /// Retail: apply the capped percentage to the base price (rounded
    /// half-up to kopecks), then subtract the flat rouble discount,
    /// clamping at zero. Wholesale: the base wholesale price as is.
    #[must_use]
    pub fn effective_price(&self, tier: PriceTier, extra_percent: Decimal) -> Decimal {
        let base = self.base_price(tier);
        if tier == PriceTier::Wholesale {
            return base;
        }
        let percent = self.applied_percent(extra_percent);
        let factor = Decimal::ONE - percent / Decimal::ONE_HUNDRED;
        let discounted =
            (base * factor).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        (discounted - self.discount_rub).max(Decimal::ZERO)
    }
}

/// Line total for one order line.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Order total: the sum of line totals plus the delivery price.
#[must_use]
pub fn order_total(line_totals: &[Decimal], delivery_price: Decimal) -> Decimal {
    line_totals.iter().copied().sum::<Decimal>() + delivery_price
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("decimal literal")
    }

    fn machine() -> ProductPricing {
        ProductPricing {
            price: dec("24990"),
            ws_price: dec("19990"),
            currency_rate: Decimal::ONE,
            discount_percent: dec("10"),
            max_discount_percent: dec("15"),
            discount_rub: Decimal::ZERO,
        }
    }

    #[test]
    fn retail_percent_discount_applies() {
        let price = machine().effective_price(PriceTier::Retail, Decimal::ZERO);
        assert_eq!(price, dec("22491.00"));
    }

    #[test]
    fn extra_percent_is_capped_by_max() {
        let pricing = machine();
        // 10 + 20 = 30, capped at 15.
        assert_eq!(pricing.applied_percent(dec("20")), dec("15"));
        let price = pricing.effective_price(PriceTier::Retail, dec("20"));
        assert_eq!(price, dec("21241.50"));
    }

    #[test]
    fn zero_max_discount_disables_percentages() {
        let mut pricing = machine();
        pricing.max_discount_percent = Decimal::ZERO;
        let price = pricing.effective_price(PriceTier::Retail, dec("50"));
        assert_eq!(price, dec("24990"));
    }

    #[test]
    fn rouble_discount_subtracts_after_percent() {
        let mut pricing = machine();
        pricing.discount_percent = Decimal::ZERO;
        pricing.discount_rub = dec("500");
        let price = pricing.effective_price(PriceTier::Retail, Decimal::ZERO);
        assert_eq!(price, dec("24490"));
    }

    #[test]
    fn effective_price_never_goes_negative() {
        let mut pricing = ProductPricing::flat(dec("100"));
        pricing.discount_rub = dec("150");
        let price = pricing.effective_price(PriceTier::Retail, Decimal::ZERO);
        assert_eq!(price, Decimal::ZERO);
    }

    #[test]
    fn wholesale_bypasses_discounts() {
        let mut pricing = machine();
        pricing.discount_rub = dec("1000");
        let price = pricing.effective_price(PriceTier::Wholesale, dec("50"));
        assert_eq!(price, dec("19990"));
    }

    #[test]
    fn currency_conversion_rounds_to_whole_roubles() {
        let mut pricing = ProductPricing::flat(dec("299.99"));
        pricing.currency_rate = dec("92.5");
        // 299.99 * 92.5 = 27749.075 -> 27749
        assert_eq!(pricing.base_price(PriceTier::Retail), dec("27749"));
    }

    #[test]
    fn negative_extra_percent_is_ignored() {
        let pricing = machine();
        assert_eq!(pricing.applied_percent(dec("-5")), dec("10"));
    }

    #[test]
    fn validate_rejects_bad_rows() {
        let mut pricing = machine();
        pricing.currency_rate = Decimal::ZERO;
        assert!(pricing.validate().is_err());

        let mut pricing = machine();
        pricing.discount_percent = dec("120");
        assert!(pricing.validate().is_err());

        let mut pricing = machine();
        pricing.price = dec("-1");
        assert!(pricing.validate().is_err());

        assert!(machine().validate().is_ok());
    }

    #[test]
    fn order_total_sums_lines_and_delivery() {
        let lines = [dec("100.50"), dec("49.50")];
        assert_eq!(order_total(&lines, dec("350")), dec("500.00"));
        assert_eq!(order_total(&[], dec("350")), dec("350"));
    }

    #[test]
    fn line_total_multiplies_by_quantity() {
        assert_eq!(line_total(dec("12.33"), 3), dec("36.99"));
    }
}
