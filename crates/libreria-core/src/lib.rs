//! # libreria-core: Pure Business Logic for the Bookstore
//!
//! Every rule that decides what a customer pays, what they may do and how
//! sales are grouped lives here, as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Libreria Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    REST API (axum)                              │   │
//! │  │    /login  /productos  /carrito  /pedidos  /reportes            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ libreria-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │ pricing  │ │ discount │ │   cart   │ │   permissions    │  │   │
//! │  │   │  offers  │ │  tiers   │ │ summary  │ │  role checks     │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │  types   │ │  money   │ │ reports  │ │   validation     │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  libreria-db (Database Layer)                   │   │
//! │  │          SQLite queries, migrations, checkout transaction       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Offer, Cart, Order, User, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`pricing`] - Offer-adjusted unit price resolution
//! - [`discount`] - Tiered order discount
//! - [`cart`] - Line math, stock checks and cart summaries
//! - [`permissions`] - Permission names and the authorization rule
//! - [`reports`] - Date ranges, period presets and report arithmetic
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use libreria_core::discount::order_totals;
//! use libreria_core::money::Money;
//!
//! // One line: $100.00 x 7 = $700.00, which lands in the 25% tier
//! let totals = order_totals([Money::from_cents(70_000)]);
//!
//! assert_eq!(totals.discount_pct, 25);
//! assert_eq!(totals.total.cents(), 52_500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod discount;
pub mod error;
pub mod money;
pub mod permissions;
pub mod pricing;
pub mod reports;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single product on one cart or order line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest product price or offer discount, in cents ($999,999.99).
///
/// Eight digits with two decimals, so `price × MAX_ITEM_QUANTITY` always
/// fits in an `i64`.
pub const MAX_PRICE_CENTS: i64 = 99_999_999;

/// Category whose products are not books.
///
/// Products in this category may not carry a genre, author or publisher.
pub const ACCESSORIES_CATEGORY: &str = "accessories";
