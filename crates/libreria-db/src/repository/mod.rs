//! # Repository Module
//!
//! Database repository implementations for the bookstore.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  HTTP handler                                                           │
//! │       │                                                                 │
//! │       │  db.carts().add_product(&cart_id, &product_id, 2)               │
//! │       ▼                                                                 │
//! │  CartRepository                                                         │
//! │  ├── stock check        (libreria_core::cart::check_stock)              │
//! │  ├── price resolution   (libreria_core::pricing::resolve)               │
//! │  └── SQL                                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! │                                                                         │
//! │  Helpers that must run inside a caller's transaction take               │
//! │  `&mut SqliteConnection` instead of the pool.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Categories, genres, authors, publishers
//! - [`ProductRepository`](product::ProductRepository) - Product CRUD, filters, offer links
//! - [`OfferRepository`](offer::OfferRepository) - Offer CRUD and in-effect queries
//! - [`UserRepository`](user::UserRepository) - Accounts, credentials, principals
//! - [`RoleRepository`](role::RoleRepository) - Roles and their permission sets
//! - [`PermissionRepository`](permission::PermissionRepository) - Permission names
//! - [`CartRepository`](cart::CartRepository) - Carts and cart lines
//! - [`OrderRepository`](order::OrderRepository) - Checkout and orders
//! - [`ReportRepository`](report::ReportRepository) - Sales aggregations

pub mod cart;
pub mod catalog;
pub mod offer;
pub mod order;
pub mod permission;
pub mod product;
pub mod report;
pub mod role;
pub mod user;

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::DbResult;

/// Opens a transaction holding SQLite's write lock from its first statement.
///
/// A deferred transaction that reads before it writes cannot upgrade its
/// snapshot once another writer has committed; SQLite answers `SQLITE_BUSY`
/// without waiting. `BEGIN IMMEDIATE` queues on the busy timeout instead.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Generates a new random identifier.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// =============================================================================
// Test Fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared setup for repository tests.

    use chrono::{Duration, Utc};
    use libreria_core::{Offer, Product, User};

    use crate::repository::offer::NewOffer;
    use crate::repository::product::NewProduct;
    use crate::repository::user::NewUser;
    use crate::{Database, DbConfig};

    pub async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn product(db: &Database, name: &str, price_cents: i64, stock: i64) -> Product {
        db.products()
            .insert(&NewProduct {
                name: name.to_string(),
                price_cents,
                stock,
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub async fn user(db: &Database, email: &str) -> User {
        db.users()
            .insert(&NewUser {
                email: email.to_string(),
                full_name: email.to_string(),
                password: "secret".to_string(),
                phone: None,
                address: None,
                role_id: None,
            })
            .await
            .unwrap()
    }

    /// An offer in effect from yesterday until tomorrow.
    pub async fn current_offer(db: &Database, name: &str, discount_cents: i64) -> Offer {
        let now = Utc::now();
        db.offers()
            .insert(&NewOffer {
                name: name.to_string(),
                description: String::new(),
                discount_cents,
                starts_at: now - Duration::days(1),
                ends_at: now + Duration::days(1),
            })
            .await
            .unwrap()
    }
}
