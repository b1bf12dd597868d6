//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  With floats:                                                           │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A 15% tier on $433.33:                                                 │
//! │    433.33 * 0.85 = 368.3305 → which cent do we keep?                    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    43333 cents, total (43333*8500 + 5000) / 10000 = 36833 cents        │
//! │    Rounding happens once, at a known place                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use libreria_core::money::Money;
//!
//! let price = Money::from_cents(1099);                 // $10.99
//! let line = price.multiply_quantity(3).unwrap();        // $32.97
//! let total = line + Money::from_cents(500);             // $37.97
//! assert_eq!(total.cents(), 3797);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in cents.
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price_cents ──► pricing::resolve ──► CartLine.unit_price       │
/// │                                                    │                    │
/// │                                   × quantity ──────┘                    │
/// │                                        │                                │
/// │                                        ▼                                │
/// │  Σ line subtotals ──► discount::order_totals ──► Order.total_cents      │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use libreria_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-dollar portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Subtracts, flooring the result at zero.
    ///
    /// ## Example
    /// ```rust
    /// use libreria_core::money::Money;
    ///
    /// let price = Money::from_cents(5000);
    /// let discount = Money::from_cents(6000);
    /// assert_eq!(price.saturating_sub(discount), Money::zero());
    /// ```
    #[inline]
    pub fn saturating_sub(self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Returns
    /// * `Err(ValidationError::TooLarge)` - the product does not fit in i64
    ///
    /// ## Example
    /// ```rust
    /// use libreria_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(2999); // $29.99
    /// let line_total = unit_price.multiply_quantity(3).unwrap();
    /// assert_eq!(line_total.cents(), 8997); // $89.97
    ///
    /// assert!(Money::from_cents(i64::MAX / 2).multiply_quantity(3).is_err());
    /// ```
    pub fn multiply_quantity(&self, qty: i64) -> Result<Money, ValidationError> {
        self.0
            .checked_mul(qty)
            .map(Money)
            .ok_or_else(|| ValidationError::TooLarge {
                field: "subtotal".to_string(),
            })
    }

    /// Multiplies by a quantity, clamping at the i64 bounds.
    ///
    /// For display figures derived from already stored lines.
    #[inline]
    pub const fn saturating_multiply_quantity(&self, qty: i64) -> Money {
        Money(self.0.saturating_mul(qty))
    }

    /// Returns `bps` basis points of the amount.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`
    /// The +5000 rounds half up to the nearest cent.
    pub fn percentage_of(&self, bps: u32) -> Money {
        // i128 keeps large order totals from overflowing
        let cents = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money::from_cents(cents as i64)
    }

    /// Formats as a plain decimal string ("525.00") for CSV exports.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows money as "$10.99".
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(Money::from_cents(52_500).to_decimal_string(), "525.00");
        assert_eq!(Money::from_cents(7).to_decimal_string(), "0.07");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.multiply_quantity(3).unwrap().cents(), 3000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let price = Money::from_cents(5000);
        assert_eq!(price.saturating_sub(Money::from_cents(1500)).cents(), 3500);
        assert_eq!(price.saturating_sub(Money::from_cents(6000)).cents(), 0);
    }

    #[test]
    fn test_multiply_quantity_rejects_overflow() {
        let huge = Money::from_cents(i64::MAX / 2);

        assert_eq!(huge.multiply_quantity(2).unwrap().cents(), i64::MAX - 1);
        assert!(matches!(
            huge.multiply_quantity(3),
            Err(ValidationError::TooLarge { .. })
        ));
        assert_eq!(huge.saturating_multiply_quantity(3).cents(), i64::MAX);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // $433.33 at 15% = $64.9995 → $65.00
        let subtotal = Money::from_cents(43_333);
        assert_eq!(subtotal.percentage_of(1500).cents(), 6500);
    }
}
