//! Inventory reconciliation across suppliers and sales channels.
//!
//! The shop carries very little stock of its own; most quantities come
//! from supplier feeds. What a channel may sell is the supplier total
//! restricted to that channel's supplier set, minus what open orders
//! have already reserved.

use serde::{Deserialize, Serialize};

/// Stock held at one supplier for one product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierStock {
    pub supplier: String,
    pub quantity: i32,
}

/// Sellable quantity for a product on one channel.
///
/// Sums the quantities of suppliers the channel is allowed to draw from
/// (`None` means all suppliers), subtracts `reserved` (units committed
/// to open orders), and clamps at zero. Negative supplier quantities —
/// which do show up in feeds after returns — are taken at face value so
/// they reduce the total.
#[must_use]
pub fn available_quantity(
    stocks: &[SupplierStock],
    allowed_suppliers: Option<&[String]>,
    reserved: i64,
) -> u32 {
    let total: i64 = stocks
        .iter()
        .filter(|s| match allowed_suppliers {
            Some(allowed) => allowed.iter().any(|a| a == &s.supplier),
            None => true,
        })
        .map(|s| i64::from(s.quantity))
        .sum();

    u32::try_from((total - reserved).max(0)).unwrap_or(u32::MAX)
}
