//! # Pricing Resolution
//!
//! Turns a product and its (optional) offer into the price a customer pays
//! right now.
//!
//! ## Resolution Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Effective Unit Price                                │
//! │                                                                         │
//! │  product.offer_id?                                                      │
//! │      │                                                                  │
//! │      ├── none ──────────────────────────► price = base, discount = 0    │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  offer.is_in_effect(now)?                                               │
//! │      │                                                                  │
//! │      ├── no ────────────────────────────► price = base, discount = 0    │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  price    = max(base - offer.discount, 0)                               │
//! │  discount = min(offer.discount, base)                                   │
//! │                                                                         │
//! │  Example: base $50, offer $60 → price $0, discount $50                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The result is re-evaluated every time a cart line is saved and copied
//! verbatim into order lines at checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Offer, Product};

/// Prices frozen onto a cart or order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// What the customer pays per unit.
    pub unit_price: Money,
    /// Base price per unit.
    pub original_price: Money,
    /// Per-unit discount actually granted.
    pub discount: Money,
    /// Name of the offer that produced the discount.
    pub offer_name: Option<String>,
}

impl PriceSnapshot {
    /// Subtotal for `quantity` units at the snapshot price.
    #[inline]
    pub fn subtotal(&self, quantity: i64) -> Result<Money, ValidationError> {
        self.unit_price.multiply_quantity(quantity)
    }

    pub fn has_offer(&self) -> bool {
        self.discount.is_positive()
    }
}

/// Resolves the effective unit price of `product` at `now`.
///
/// `offer` is the offer referenced by `product.offer_id`, if it was loaded.
/// An offer whose id does not match the product is ignored.
///
/// ## Example
/// ```rust,ignore
/// let snapshot = resolve(&product, offer.as_ref(), Utc::now());
/// line.unit_price_cents = snapshot.unit_price.cents();
/// ```
pub fn resolve(product: &Product, offer: Option<&Offer>, now: DateTime<Utc>) -> PriceSnapshot {
    let base = product.price();

    let offer = offer.filter(|o| {
        product.offer_id.as_deref() == Some(o.id.as_str()) && o.is_in_effect(now)
    });

    match offer {
        Some(offer) => PriceSnapshot {
            unit_price: base.saturating_sub(offer.discount()),
            original_price: base,
            discount: offer.discount().min(base),
            offer_name: Some(offer.name.clone()),
        },
        None => PriceSnapshot {
            unit_price: base,
            original_price: base,
            discount: Money::zero(),
            offer_name: None,
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn product(price_cents: i64, offer_id: Option<&str>) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            name: "Dune".to_string(),
            description: String::new(),
            stock: 10,
            price_cents,
            image_url: None,
            category_id: None,
            genre_id: None,
            author_id: None,
            publisher_id: None,
            offer_id: offer_id.map(String::from),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn offer(discount_cents: i64, days_from_now: i64) -> Offer {
        let now = Utc::now();
        Offer {
            id: "o-1".to_string(),
            name: "Book Week".to_string(),
            description: String::new(),
            discount_cents,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(days_from_now),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_no_offer_uses_base_price() {
        let p = product(10_000, None);
        let snap = resolve(&p, None, Utc::now());

        assert_eq!(snap.unit_price.cents(), 10_000);
        assert_eq!(snap.original_price.cents(), 10_000);
        assert!(snap.discount.is_zero());
        assert_eq!(snap.offer_name, None);
        assert!(!snap.has_offer());
    }

    #[test]
    fn test_offer_in_effect_reduces_price() {
        let p = product(10_000, Some("o-1"));
        let o = offer(1_500, 5);
        let snap = resolve(&p, Some(&o), Utc::now());

        assert_eq!(snap.unit_price.cents(), 8_500);
        assert_eq!(snap.discount.cents(), 1_500);
        assert_eq!(snap.offer_name.as_deref(), Some("Book Week"));
        assert_eq!(snap.subtotal(3).unwrap().cents(), 25_500);
    }

    #[test]
    fn test_discount_larger_than_price_is_clamped() {
        // price 50, discount 60 → price 0, discount 50
        let p = product(5_000, Some("o-1"));
        let o = offer(6_000, 5);
        let snap = resolve(&p, Some(&o), Utc::now());

        assert_eq!(snap.unit_price.cents(), 0);
        assert_eq!(snap.discount.cents(), 5_000);
    }

    #[test]
    fn test_expired_offer_is_ignored() {
        let p = product(10_000, Some("o-1"));
        let o = offer(1_500, -1);
        let snap = resolve(&p, Some(&o), Utc::now() + Duration::hours(1));

        assert_eq!(snap.unit_price.cents(), 10_000);
        assert!(snap.discount.is_zero());
        assert_eq!(snap.offer_name, None);
    }

    #[test]
    fn test_offer_not_linked_to_product_is_ignored() {
        let p = product(10_000, Some("other-offer"));
        let o = offer(1_500, 5);
        let snap = resolve(&p, Some(&o), Utc::now());

        assert_eq!(snap.unit_price.cents(), 10_000);
    }

    #[test]
    fn test_resolved_price_never_negative() {
        let now = Utc::now();
        for price in [0, 1, 999, 5_000, 123_456] {
            for discount in [1, 500, 5_000, 1_000_000] {
                let p = product(price, Some("o-1"));
                let o = offer(discount, 5);
                let snap = resolve(&p, Some(&o), now);

                assert!(snap.unit_price.cents() >= 0);
                assert_eq!(snap.unit_price.cents(), (price - discount).max(0));
                assert_eq!(snap.discount.cents(), discount.min(price));
            }
        }
    }
}
