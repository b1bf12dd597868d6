//! # Cart and Line Math
//!
//! Snapshot application, stock checks and the summary shown with a cart.
//!
//! ## Line Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add product ──► check_stock ──► pricing::resolve ──► apply_snapshot    │
//! │       │                                                    │            │
//! │       │ (same product already in cart: quantities merge)   │            │
//! │       ▼                                                    ▼            │
//! │  set quantity 0 ──► line.is_active = false    subtotal = unit × qty     │
//! │                                                                         │
//! │  checkout ──► snapshot copied to OrderLine, never re-resolved           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::pricing::PriceSnapshot;
use crate::types::{CartLine, Offer, OrderLine, Product};

// =============================================================================
// Priced Lines
// =============================================================================

/// Shared read access to the snapshot fields of cart and order lines.
pub trait PricedLine {
    fn quantity(&self) -> i64;
    fn unit_price(&self) -> Money;
    fn original_price(&self) -> Money;
    fn offer_discount(&self) -> Money;
    fn subtotal(&self) -> Money;
    fn offer_name(&self) -> Option<&str>;

    /// Money saved through the offer on this line.
    fn savings(&self) -> Money {
        self.offer_discount().saturating_multiply_quantity(self.quantity())
    }

    /// What the line would cost without the offer.
    fn subtotal_without_offer(&self) -> Money {
        self.original_price().saturating_multiply_quantity(self.quantity())
    }

    fn has_offer(&self) -> bool {
        self.offer_discount().is_positive()
    }
}

macro_rules! impl_priced_line {
    ($ty:ty) => {
        impl PricedLine for $ty {
            fn quantity(&self) -> i64 {
                self.quantity
            }
            fn unit_price(&self) -> Money {
                Money::from_cents(self.unit_price_cents)
            }
            fn original_price(&self) -> Money {
                Money::from_cents(self.original_price_cents)
            }
            fn offer_discount(&self) -> Money {
                Money::from_cents(self.offer_discount_cents)
            }
            fn subtotal(&self) -> Money {
                Money::from_cents(self.subtotal_cents)
            }
            fn offer_name(&self) -> Option<&str> {
                self.offer_name.as_deref()
            }
        }
    };
}

impl_priced_line!(CartLine);
impl_priced_line!(OrderLine);

impl CartLine {
    /// Re-prices the line from a fresh snapshot and its current quantity.
    ///
    /// Leaves the line untouched when the subtotal would overflow.
    pub fn apply_snapshot(&mut self, snapshot: &PriceSnapshot) -> Result<(), ValidationError> {
        let subtotal = snapshot.subtotal(self.quantity)?;

        self.unit_price_cents = snapshot.unit_price.cents();
        self.original_price_cents = snapshot.original_price.cents();
        self.offer_discount_cents = snapshot.discount.cents();
        self.offer_name = snapshot.offer_name.clone();
        self.subtotal_cents = subtotal.cents();
        Ok(())
    }
}

// =============================================================================
// Stock
// =============================================================================

/// Fails with [`CoreError::InsufficientStock`] unless `requested` units of
/// `product` are on hand.
pub fn check_stock(product: &Product, requested: i64) -> CoreResult<()> {
    if !product.is_active {
        return Err(CoreError::ProductUnavailable(product.name.clone()));
    }
    if !product.has_stock(requested) {
        return Err(CoreError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock,
            requested,
        });
    }
    Ok(())
}

// =============================================================================
// Summary
// =============================================================================

/// Whether an offer seen on a cart line still applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OfferStatus {
    pub name: String,
    /// False once the offer expired or was switched off after the line was
    /// saved.
    pub in_effect: bool,
}

/// Totals shown alongside a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartSummary {
    pub total_cents: i64,
    pub original_total_cents: i64,
    pub savings_cents: i64,
    /// Σ quantity over active lines.
    pub product_count: i64,
    /// Number of active lines.
    pub item_count: i64,
    pub offers: Vec<OfferStatus>,
}

impl CartSummary {
    pub fn active_offers(&self) -> impl Iterator<Item = &OfferStatus> {
        self.offers.iter().filter(|o| o.in_effect)
    }

    pub fn expired_offers(&self) -> impl Iterator<Item = &OfferStatus> {
        self.offers.iter().filter(|o| !o.in_effect)
    }
}

/// Summarizes the active lines of a cart.
///
/// `offers` are the offers currently known to the store; a line's offer is
/// matched by the name in its snapshot. Names with no matching offer count
/// as expired.
pub fn summarize(lines: &[CartLine], offers: &[Offer], now: DateTime<Utc>) -> CartSummary {
    let active: Vec<&CartLine> = lines.iter().filter(|l| l.is_active).collect();

    let total: Money = active.iter().map(|l| l.subtotal()).sum();
    let original_total: Money = active.iter().map(|l| l.subtotal_without_offer()).sum();

    let mut seen: BTreeMap<&str, bool> = BTreeMap::new();
    for line in active.iter().filter(|l| l.has_offer()) {
        if let Some(name) = line.offer_name() {
            let in_effect = offers
                .iter()
                .any(|o| o.name == name && o.is_in_effect(now));
            seen.insert(name, in_effect);
        }
    }

    CartSummary {
        total_cents: total.cents(),
        original_total_cents: original_total.cents(),
        savings_cents: (original_total - total).cents(),
        product_count: active.iter().map(|l| l.quantity).sum(),
        item_count: active.len() as i64,
        offers: seen
            .into_iter()
            .map(|(name, in_effect)| OfferStatus {
                name: name.to_string(),
                in_effect,
            })
            .collect(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn line(quantity: i64, unit: i64, original: i64, offer: Option<&str>) -> CartLine {
        let now = Utc::now();
        CartLine {
            id: format!("line-{}-{}", quantity, unit),
            cart_id: "cart-1".to_string(),
            product_id: "p-1".to_string(),
            quantity,
            unit_price_cents: unit,
            original_price_cents: original,
            offer_discount_cents: original - unit,
            offer_name: offer.map(String::from),
            subtotal_cents: unit * quantity,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn product(stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            name: "Dune".to_string(),
            description: String::new(),
            stock,
            price_cents: 2_000,
            image_url: None,
            category_id: None,
            genre_id: None,
            author_id: None,
            publisher_id: None,
            offer_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_line_computed_values() {
        let l = line(3, 800, 1_000, Some("Book Week"));
        assert_eq!(l.savings().cents(), 600);
        assert_eq!(l.subtotal_without_offer().cents(), 3_000);
        assert!(l.has_offer());

        let plain = line(2, 1_000, 1_000, None);
        assert!(!plain.has_offer());
        assert!(plain.savings().is_zero());
    }

    #[test]
    fn test_apply_snapshot_recomputes_subtotal() {
        let mut l = line(4, 1_000, 1_000, None);
        let snap = PriceSnapshot {
            unit_price: Money::from_cents(750),
            original_price: Money::from_cents(1_000),
            discount: Money::from_cents(250),
            offer_name: Some("Flash".to_string()),
        };
        l.apply_snapshot(&snap).unwrap();

        assert_eq!(l.unit_price_cents, 750);
        assert_eq!(l.subtotal_cents, 3_000);
        assert_eq!(l.offer_name.as_deref(), Some("Flash"));
        assert_eq!(l.subtotal_cents, l.unit_price_cents * l.quantity);
    }

    #[test]
    fn test_apply_snapshot_rejects_overflowing_subtotal() {
        let mut l = line(3, 1_000, 1_000, None);
        let snap = PriceSnapshot {
            unit_price: Money::from_cents(i64::MAX / 2),
            original_price: Money::from_cents(i64::MAX / 2),
            discount: Money::zero(),
            offer_name: None,
        };

        assert!(matches!(
            l.apply_snapshot(&snap),
            Err(ValidationError::TooLarge { .. })
        ));
        assert_eq!(l.unit_price_cents, 1_000);
        assert_eq!(l.subtotal_cents, 3_000);
    }

    #[test]
    fn test_check_stock() {
        assert!(check_stock(&product(5), 5).is_ok());

        let err = check_stock(&product(3), 5).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { available: 3, requested: 5, .. }
        ));

        let mut inactive = product(10);
        inactive.is_active = false;
        assert!(matches!(
            check_stock(&inactive, 1),
            Err(CoreError::ProductUnavailable(_))
        ));
    }

    #[test]
    fn test_summary_totals_and_offer_status() {
        let now = Utc::now();
        let live = Offer {
            id: "o-1".to_string(),
            name: "Book Week".to_string(),
            description: String::new(),
            discount_cents: 200,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let mut gone = live.clone();
        gone.id = "o-2".to_string();
        gone.name = "Old Sale".to_string();
        gone.ends_at = now - Duration::hours(1);

        let mut removed = line(9, 100, 100, None);
        removed.is_active = false;

        let lines = vec![
            line(3, 800, 1_000, Some("Book Week")),
            line(1, 1_500, 2_000, Some("Old Sale")),
            line(2, 500, 500, None),
            removed,
        ];

        let summary = summarize(&lines, &[live, gone], now);

        assert_eq!(summary.total_cents, 2_400 + 1_500 + 1_000);
        assert_eq!(summary.original_total_cents, 3_000 + 2_000 + 1_000);
        assert_eq!(summary.savings_cents, 1_100);
        assert_eq!(summary.product_count, 6);
        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.active_offers().count(), 1);
        assert_eq!(summary.expired_offers().count(), 1);
        assert_eq!(summary.expired_offers().next().unwrap().name, "Old Sale");
    }
}
