//! # Domain Types
//!
//! Core domain types used throughout the bookstore.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌───────────────┐     ┌───────────────┐     ┌───────────────┐         │
//! │  │ CatalogEntry  │◄────│   Product     │────►│    Offer      │         │
//! │  │ category      │ 0..4│ price_cents   │ 0..1│ discount_cents│         │
//! │  │ genre, author │     │ stock         │     │ starts/ends_at│         │
//! │  │ publisher     │     └───────▲───────┘     └───────────────┘         │
//! │  └───────────────┘             │                                        │
//! │                      ┌─────────┴─────────┐                              │
//! │  ┌──────────┐  1..n  │ CartLine          │   snapshots: unit price,    │
//! │  │   Cart   │───────►│ OrderLine         │   original price, offer     │
//! │  └──────────┘        └─────────▲─────────┘   discount, offer name      │
//! │  ┌──────────┐  1..n            │                                        │
//! │  │  Order   │──────────────────┘                                        │
//! │  └──────────┘                                                           │
//! │                                                                         │
//! │  ┌──────────┐  0..1  ┌──────────┐  n..m  ┌────────────┐                │
//! │  │   User   │───────►│   Role   │───────►│ Permission │                │
//! │  └──────────┘        └──────────┘        └────────────┘                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity is keyed by a UUID v4 string. Money columns end in `_cents`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Catalog
// =============================================================================

/// The four lookup tables a product can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Category,
    Genre,
    Author,
    Publisher,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 4] = [
        CatalogKind::Category,
        CatalogKind::Genre,
        CatalogKind::Author,
        CatalogKind::Publisher,
    ];

    /// Backing table name.
    pub const fn table(&self) -> &'static str {
        match self {
            CatalogKind::Category => "categories",
            CatalogKind::Genre => "genres",
            CatalogKind::Author => "authors",
            CatalogKind::Publisher => "publishers",
        }
    }

    /// Human-readable entity name used in error messages.
    pub const fn label(&self) -> &'static str {
        match self {
            CatalogKind::Category => "Category",
            CatalogKind::Genre => "Genre",
            CatalogKind::Author => "Author",
            CatalogKind::Publisher => "Publisher",
        }
    }

    /// Plural used to build permission names (`view_categories`, ...).
    pub const fn plural(&self) -> &'static str {
        self.table()
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A category, genre, author or publisher.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A book (or accessory) for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, unique case-insensitively.
    pub name: String,

    pub description: String,

    /// Units on hand. Never negative.
    pub stock: i64,

    /// Base price in cents, before any offer.
    pub price_cents: i64,

    pub image_url: Option<String>,

    pub category_id: Option<String>,
    pub genre_id: Option<String>,
    pub author_id: Option<String>,
    pub publisher_id: Option<String>,

    /// Promotional offer attached to this product, if any.
    pub offer_id: Option<String>,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the base price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether `quantity` units can be taken from stock.
    #[inline]
    pub fn has_stock(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

// =============================================================================
// Offer
// =============================================================================

/// A named absolute-amount discount, active within a date range.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Offer {
    pub id: String,
    pub name: String,
    pub description: String,

    /// Amount taken off the base price, in cents.
    pub discount_cents: i64,

    #[ts(as = "String")]
    pub starts_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub ends_at: DateTime<Utc>,

    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    /// An offer is in effect iff it is active and `now` lies within
    /// `[starts_at, ends_at]`, both ends inclusive.
    pub fn is_in_effect(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.starts_at <= now && now <= self.ends_at
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A shopping cart owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Cart {
    pub id: String,
    pub user_id: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One product in a cart, with the price snapshot taken when it was saved.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CartLine {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    pub quantity: i64,

    /// Offer-adjusted unit price at save time.
    pub unit_price_cents: i64,

    /// Base price at save time.
    pub original_price_cents: i64,

    /// Offer discount applied per unit at save time.
    pub offer_discount_cents: i64,

    pub offer_name: Option<String>,

    /// Always `unit_price_cents * quantity`.
    pub subtotal_cents: i64,

    /// Soft-delete flag.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Order
// =============================================================================

/// A placed order. Immutable once created, except for its rating.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub user_id: String,

    /// Customer rating, 1-5.
    pub rating: Option<i64>,

    /// Tier discount percentage (0, 10, 15 or 25).
    pub discount_pct: i64,

    /// Total after the tier discount, in cents.
    pub total_cents: i64,

    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// One product in an order. Same snapshot shape as [`CartLine`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub original_price_cents: i64,
    pub offer_discount_cents: i64,
    pub offer_name: Option<String>,
    pub subtotal_cents: i64,
}

// =============================================================================
// Users, Roles, Permissions
// =============================================================================

/// A named capability, e.g. `edit_products`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Permission {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A role groups permissions and is assigned to users.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// An account. The credential hash never leaves the database layer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role_id: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Report Grouping
// =============================================================================

/// Bucket size for sales-over-time reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    Day,
    Week,
    Month,
    Year,
}

impl Grouping {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Grouping::Day => "day",
            Grouping::Week => "week",
            Grouping::Month => "month",
            Grouping::Year => "year",
        }
    }
}

impl FromStr for Grouping {
    type Err = ValidationError;

    /// Accepts English names and the Spanish query values used by the API.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "dia" | "día" => Ok(Grouping::Day),
            "week" | "semana" => Ok(Grouping::Week),
            "month" | "mes" => Ok(Grouping::Month),
            "year" | "año" | "ano" => Ok(Grouping::Year),
            _ => Err(ValidationError::NotAllowed {
                field: "agrupar_por".to_string(),
                allowed: ["day", "week", "month", "year"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn offer(is_active: bool, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Offer {
        let now = Utc::now();
        Offer {
            id: "offer-1".to_string(),
            name: "Spring Sale".to_string(),
            description: String::new(),
            discount_cents: 500,
            starts_at,
            ends_at,
            is_active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_offer_in_effect_window_is_inclusive() {
        let now = Utc::now();
        let start = now - Duration::days(1);
        let end = now + Duration::days(1);
        let o = offer(true, start, end);

        assert!(o.is_in_effect(now));
        assert!(o.is_in_effect(start));
        assert!(o.is_in_effect(end));
        assert!(!o.is_in_effect(end + Duration::seconds(1)));
        assert!(!o.is_in_effect(start - Duration::seconds(1)));
    }

    #[test]
    fn test_inactive_offer_never_in_effect() {
        let now = Utc::now();
        let o = offer(false, now - Duration::days(1), now + Duration::days(1));
        assert!(!o.is_in_effect(now));
    }

    #[test]
    fn test_grouping_parses_aliases() {
        assert_eq!("dia".parse::<Grouping>().unwrap(), Grouping::Day);
        assert_eq!("Semana".parse::<Grouping>().unwrap(), Grouping::Week);
        assert_eq!("month".parse::<Grouping>().unwrap(), Grouping::Month);
        assert_eq!("año".parse::<Grouping>().unwrap(), Grouping::Year);
        assert!("fortnight".parse::<Grouping>().is_err());
    }

    #[test]
    fn test_catalog_kind_tables() {
        assert_eq!(CatalogKind::Category.table(), "categories");
        assert_eq!(CatalogKind::Publisher.label(), "Publisher");
        assert_eq!(CatalogKind::ALL.len(), 4);
    }
}
