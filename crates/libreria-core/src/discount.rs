//! # Order Discount Tiers
//!
//! Orders earn a percentage discount based on the sum of their line
//! subtotals.
//!
//! ```text
//! ┌──────────────────────────────┬──────────┐
//! │ Pre-discount subtotal        │ Discount │
//! ├──────────────────────────────┼──────────┤
//! │ ≤ $200.00                    │    0%    │
//! │ > $200.00                    │   10%    │
//! │ > $400.00                    │   15%    │
//! │ > $600.00                    │   25%    │
//! └──────────────────────────────┴──────────┘
//! ```
//!
//! Thresholds compare with strict `>`: exactly $200.00 gets 0%. The total
//! is rounded half up to the cent and the discount is whatever that removes.

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Tiers as (threshold, percent), highest first.
pub const DISCOUNT_TIERS: [(Money, i64); 3] = [
    (Money::from_cents(60_000), 25),
    (Money::from_cents(40_000), 15),
    (Money::from_cents(20_000), 10),
];

/// Discount percentage earned by a pre-discount subtotal.
pub fn tier_percent(subtotal: Money) -> i64 {
    DISCOUNT_TIERS
        .iter()
        .find(|(threshold, _)| subtotal > *threshold)
        .map(|(_, pct)| *pct)
        .unwrap_or(0)
}

/// Result of pricing a whole order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    /// Σ line subtotals.
    pub subtotal: Money,
    pub discount_pct: i64,
    /// `subtotal - total`.
    pub discount: Money,
    /// `subtotal × (100 - discount_pct) / 100`, rounded half up.
    pub total: Money,
}

/// Computes the tier and total for a set of line subtotals.
///
/// ## Example
/// ```rust
/// use libreria_core::discount::order_totals;
/// use libreria_core::money::Money;
///
/// let totals = order_totals([Money::from_cents(25_000), Money::from_cents(5_000)]);
/// assert_eq!(totals.discount_pct, 10);
/// assert_eq!(totals.total.cents(), 27_000);
/// ```
pub fn order_totals<I>(line_subtotals: I) -> OrderTotals
where
    I: IntoIterator<Item = Money>,
{
    let subtotal: Money = line_subtotals.into_iter().sum();
    let discount_pct = tier_percent(subtotal);
    let total = subtotal.percentage_of(((100 - discount_pct) * 100) as u32);

    OrderTotals {
        subtotal,
        discount_pct,
        discount: subtotal - total,
        total,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
