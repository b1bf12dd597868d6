//! # libreria-db: Database Layer for the Bookstore
//!
//! This crate provides persistence for the bookstore backend.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Request Data Flow                                │
//! │                                                                         │
//! │  HTTP handler (POST /Libreria/carrito/{id}/pedido)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     libreria-db (THIS CRATE)                    │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │    │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │    │    │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │    │    │
//! │  │   │               │    │ ProductRepo   │    │              │    │    │
//! │  │   │ SqlitePool    │◄───│ CartRepo      │    │ 001_init.sql │    │    │
//! │  │   │ Connection    │    │ OrderRepo     │    │              │    │    │
//! │  │   │ Management    │    │ ReportRepo    │    │              │    │    │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘    │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     SQLite Database (libreria.db)               │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use libreria_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./libreria.db")).await?;
//!
//! let cart = db.carts().get_or_create_active(&user_id).await?;
//! db.carts().add_product(&cart.id, &product_id, 2).await?;
//! let order = db.orders().convert_cart(&cart.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, LoginFailure};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::offer::{NewOffer, OfferRepository};
pub use repository::order::{OrderRepository, OrderWithLines};
pub use repository::permission::PermissionRepository;
pub use repository::product::{NewProduct, ProductFilter, ProductRepository};
pub use repository::report::ReportRepository;
pub use repository::role::{RoleRepository, RoleWithPermissions};
pub use repository::user::{NewUser, UserChanges, UserRepository};
