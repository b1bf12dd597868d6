//! # Cart Repository
//!
//! Carts and their lines.
//!
//! ## Line Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  add_product(cart, product, 2)                                          │
//! │       │                                                                 │
//! │       ├── active line for product exists? ── yes ──► qty = old + 2      │
//! │       │                                  no  ──► new line, qty = 2      │
//! │       ▼                                                                 │
//! │  check_stock(product, qty)   ← merged quantity, not just the increment  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  pricing::resolve(product, offer, now) ──► snapshot stored on the line  │
//! │                                                                         │
//! │  set_quantity(line, 0) / reduce_quantity below 1 / remove_line          │
//! │       └──► is_active = 0 (row kept)                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every save re-resolves the price, so a line always carries the price in
//! effect when it was last touched.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use libreria_core::cart::{self, CartSummary};
use libreria_core::validation::validate_quantity;
use libreria_core::{Cart, CartLine, CoreError, ValidationError};

use super::{begin_write, generate_id};
use super::product::{fetch_product, price_product};
use crate::error::{DbError, DbResult};

const CART_COLUMNS: &str = "id, user_id, is_active, created_at";

pub(crate) const CART_LINE_COLUMNS: &str = "id, cart_id, product_id, quantity, unit_price_cents, \
     original_price_cents, offer_discount_cents, offer_name, subtotal_cents, is_active, \
     created_at, updated_at";

#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    // =========================================================================
    // Carts
    // =========================================================================

    /// Lists a user's carts, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Cart>> {
        let sql = format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE user_id = ?1 ORDER BY created_at DESC"
        );

        let carts = sqlx::query_as::<_, Cart>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(carts)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Cart>> {
        let mut conn = self.pool.acquire().await?;
        fetch_cart(&mut conn, id).await
    }

    /// Opens a new, empty cart for the user.
    pub async fn create(&self, user_id: &str) -> DbResult<Cart> {
        let cart = Cart {
            id: generate_id(),
            user_id: user_id.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO carts (id, user_id, is_active, created_at) VALUES (?1, ?2, 1, ?3)")
            .bind(&cart.id)
            .bind(&cart.user_id)
            .bind(cart.created_at)
            .execute(&self.pool)
            .await?;

        info!(cart_id = %cart.id, user_id = %user_id, "Cart created");
        Ok(cart)
    }

    /// Returns the user's most recent active cart, creating one if none exists.
    pub async fn get_or_create_active(&self, user_id: &str) -> DbResult<Cart> {
        let sql = format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE user_id = ?1 AND is_active = 1 \
             ORDER BY created_at DESC LIMIT 1"
        );

        let existing = sqlx::query_as::<_, Cart>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match existing {
            Some(cart) => Ok(cart),
            None => self.create(user_id).await,
        }
    }

    // =========================================================================
    // Lines
    // =========================================================================

    /// Active lines of a cart in the order they were added.
    pub async fn lines(&self, cart_id: &str) -> DbResult<Vec<CartLine>> {
        let mut conn = self.pool.acquire().await?;
        active_lines(&mut conn, cart_id).await
    }

    pub async fn get_line(&self, line_id: &str) -> DbResult<Option<CartLine>> {
        let mut conn = self.pool.acquire().await?;
        fetch_line(&mut conn, line_id).await
    }

    /// Adds `quantity` units of a product, merging into an existing active
    /// line for the same product.
    ///
    /// ## Returns
    /// * `Err(DbError::Core(InsufficientStock))` - merged quantity exceeds stock
    /// * `Err(DbError::Core(InactiveCart))` - cart already converted
    pub async fn add_product(&self, cart_id: &str, product_id: &str, quantity: i64) -> DbResult<CartLine> {
        validate_quantity(quantity)?;

        let mut tx = begin_write(&self.pool).await?;
        require_active_cart(&mut tx, cart_id).await?;

        let product = fetch_product(&mut tx, product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product_id))?;

        let sql = format!(
            "SELECT {CART_LINE_COLUMNS} FROM cart_lines \
             WHERE cart_id = ?1 AND product_id = ?2 AND is_active = 1 LIMIT 1"
        );
        let existing = sqlx::query_as::<_, CartLine>(&sql)
            .bind(cart_id)
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;

        let merged = existing.as_ref().map_or(0, |l| l.quantity) + quantity;
        validate_quantity(merged)?;
        cart::check_stock(&product, merged)?;

        let now = Utc::now();
        let snapshot = price_product(&mut tx, &product, now).await?;

        let line = match existing {
            Some(mut line) => {
                line.quantity = merged;
                line.apply_snapshot(&snapshot)?;
                line.updated_at = now;
                save_line(&mut tx, &line).await?;
                debug!(line_id = %line.id, quantity = merged, "Merged into existing cart line");
                line
            }
            None => {
                let mut line = CartLine {
                    id: generate_id(),
                    cart_id: cart_id.to_string(),
                    product_id: product_id.to_string(),
                    quantity,
                    unit_price_cents: 0,
                    original_price_cents: 0,
                    offer_discount_cents: 0,
                    offer_name: None,
                    subtotal_cents: 0,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                };
                line.apply_snapshot(&snapshot)?;
                insert_line(&mut tx, &line).await?;
                line
            }
        };

        tx.commit().await?;

        info!(
            cart_id = %cart_id,
            product_id = %product_id,
            quantity = line.quantity,
            unit_price_cents = line.unit_price_cents,
            "Product added to cart"
        );
        Ok(line)
    }

    /// Sets an active line's quantity. Zero deactivates the line; anything
    /// else is stock-checked and re-priced.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - no such line, or it was already removed
    pub async fn set_quantity(&self, line_id: &str, quantity: i64) -> DbResult<CartLine> {
        if quantity < 0 {
            return Err(ValidationError::Negative {
                field: "quantity".to_string(),
            }
            .into());
        }

        let mut tx = begin_write(&self.pool).await?;
        // Removed lines stay removed; re-adding the product opens a new one
        let mut line = fetch_line(&mut tx, line_id)
            .await?
            .filter(|l| l.is_active)
            .ok_or_else(|| DbError::not_found("Cart line", line_id))?;
        require_active_cart(&mut tx, &line.cart_id).await?;

        if quantity == 0 {
            line.is_active = false;
            line.updated_at = Utc::now();
            save_line(&mut tx, &line).await?;
        } else {
            validate_quantity(quantity)?;
            line.quantity = quantity;
            reprice(&mut tx, &mut line).await?;
        }

        tx.commit().await?;

        debug!(line_id = %line_id, quantity, active = line.is_active, "Cart line quantity set");
        Ok(line)
    }

    /// Lowers a line's quantity by `by`; at zero or below the line is
    /// deactivated.
    pub async fn reduce_quantity(&self, line_id: &str, by: i64) -> DbResult<CartLine> {
        if by <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        let line = self
            .get_line(line_id)
            .await?
            .filter(|l| l.is_active)
            .ok_or_else(|| DbError::not_found("Cart line", line_id))?;

        self.set_quantity(line_id, (line.quantity - by).max(0)).await
    }

    /// Soft-deletes one line.
    pub async fn remove_line(&self, line_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE cart_lines SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(line_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart line", line_id));
        }

        debug!(line_id = %line_id, "Cart line removed");
        Ok(())
    }

    /// Soft-deletes every active line of a cart and returns how many there were.
    pub async fn clear(&self, cart_id: &str) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE cart_lines SET is_active = 0, updated_at = ?2 WHERE cart_id = ?1 AND is_active = 1",
        )
        .bind(cart_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(cart_id = %cart_id, removed = result.rows_affected(), "Cart cleared");
        Ok(result.rows_affected())
    }

    /// Totals and offer status for a cart's active lines.
    pub async fn summary(&self, cart_id: &str) -> DbResult<CartSummary> {
        let lines = self.lines(cart_id).await?;
        let offers = super::offer::OfferRepository::new(self.pool.clone())
            .list_all()
            .await?;

        Ok(cart::summarize(&lines, &offers, Utc::now()))
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

pub(crate) async fn fetch_cart(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Cart>> {
    let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE id = ?1");

    let cart = sqlx::query_as::<_, Cart>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(cart)
}

pub(crate) async fn active_lines(conn: &mut SqliteConnection, cart_id: &str) -> DbResult<Vec<CartLine>> {
    let sql = format!(
        "SELECT {CART_LINE_COLUMNS} FROM cart_lines WHERE cart_id = ?1 AND is_active = 1 \
         ORDER BY created_at, id"
    );

    let lines = sqlx::query_as::<_, CartLine>(&sql)
        .bind(cart_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(lines)
}

async fn fetch_line(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<CartLine>> {
    let sql = format!("SELECT {CART_LINE_COLUMNS} FROM cart_lines WHERE id = ?1");

    let line = sqlx::query_as::<_, CartLine>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(line)
}

async fn require_active_cart(conn: &mut SqliteConnection, cart_id: &str) -> DbResult<Cart> {
    let cart = fetch_cart(conn, cart_id)
        .await?
        .ok_or_else(|| DbError::not_found("Cart", cart_id))?;

    if !cart.is_active {
        return Err(CoreError::InactiveCart(cart_id.to_string()).into());
    }
    Ok(cart)
}

/// Stock-checks the line's quantity and refreshes its price snapshot.
async fn reprice(conn: &mut SqliteConnection, line: &mut CartLine) -> DbResult<()> {
    let product = fetch_product(conn, &line.product_id)
        .await?
        .ok_or_else(|| DbError::not_found("Product", &line.product_id))?;

    cart::check_stock(&product, line.quantity)?;

    let now = Utc::now();
    let snapshot = price_product(conn, &product, now).await?;
    line.apply_snapshot(&snapshot)?;
    line.updated_at = now;

    save_line(conn, line).await
}

async fn insert_line(conn: &mut SqliteConnection, line: &CartLine) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO cart_lines (
            id, cart_id, product_id, quantity,
            unit_price_cents, original_price_cents, offer_discount_cents, offer_name,
            subtotal_cents, is_active, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&line.id)
    .bind(&line.cart_id)
    .bind(&line.product_id)
    .bind(line.quantity)
    .bind(line.unit_price_cents)
    .bind(line.original_price_cents)
    .bind(line.offer_discount_cents)
    .bind(&line.offer_name)
    .bind(line.subtotal_cents)
    .bind(line.is_active)
    .bind(line.created_at)
    .bind(line.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn save_line(conn: &mut SqliteConnection, line: &CartLine) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE cart_lines SET
            quantity = ?2,
            unit_price_cents = ?3,
            original_price_cents = ?4,
            offer_discount_cents = ?5,
            offer_name = ?6,
            subtotal_cents = ?7,
            is_active = ?8,
            updated_at = ?9
        WHERE id = ?1
        "#,
    )
    .bind(&line.id)
    .bind(line.quantity)
    .bind(line.unit_price_cents)
    .bind(line.original_price_cents)
    .bind(line.offer_discount_cents)
    .bind(&line.offer_name)
    .bind(line.subtotal_cents)
    .bind(line.is_active)
    .bind(line.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
