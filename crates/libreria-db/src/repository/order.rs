//! # Order Repository
//!
//! Checkout and order management.
//!
//! ## Cart → Order Conversion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    convert_cart (one transaction)                       │
//! │                                                                         │
//! │  BEGIN IMMEDIATE                                                        │
//! │    │                                                                    │
//! │    ├─ 1. UPDATE carts SET is_active = 0                                 │
//! │    │        WHERE id = ? AND is_active = 1     0 rows ─► InactiveCart   │
//! │    │                                                                    │
//! │    ├─ 2. load active cart lines                none   ─► EmptyCart      │
//! │    │                                                                    │
//! │    ├─ 3. per line:                                                      │
//! │    │     UPDATE products SET stock = stock - q                          │
//! │    │        WHERE id = ? AND stock >= q        0 rows ─► Insufficient   │
//! │    │                                                      Stock         │
//! │    ├─ 4. INSERT orders + order_lines (snapshots copied verbatim)        │
//! │    │                                                                    │
//! │    ├─ 5. tier discount on Σ subtotals                                   │
//! │    ▼                                                                    │
//! │  COMMIT        (any early return drops the transaction = ROLLBACK)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `BEGIN IMMEDIATE` takes SQLite's write lock before the first read, so
//! concurrent checkouts queue on it one after another and a second
//! conversion of the same cart sees `is_active = 0` and stops.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use libreria_core::discount::{self, OrderTotals};
use libreria_core::validation::{validate_quantity, validate_rating};
use libreria_core::{CoreError, Money, Order, OrderLine};

use super::cart::{active_lines, fetch_cart};
use super::{begin_write, generate_id};
use super::product::{fetch_product, price_product};
use crate::error::{DbError, DbResult};

const ORDER_COLUMNS: &str = "id, user_id, rating, discount_pct, total_cents, is_active, created_at";

const ORDER_LINE_COLUMNS: &str = "id, order_id, product_id, quantity, unit_price_cents, \
     original_price_cents, offer_discount_cents, offer_name, subtotal_cents";

/// An order and its lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithLines {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

impl OrderWithLines {
    /// Sum of line subtotals before the tier discount.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(|l| Money::from_cents(l.subtotal_cents)).sum()
    }
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Turns an active cart into an order. See the module docs for the steps.
    ///
    /// ## Returns
    /// * `Err(DbError::Core(InactiveCart))` - already converted or deactivated
    /// * `Err(DbError::Core(EmptyCart))` - no active lines
    /// * `Err(DbError::Core(InsufficientStock))` - some line exceeds stock;
    ///   nothing was written
    pub async fn convert_cart(&self, cart_id: &str) -> DbResult<OrderWithLines> {
        debug!(cart_id = %cart_id, "Converting cart to order");

        let mut tx = begin_write(&self.pool).await?;

        let cart = fetch_cart(&mut tx, cart_id)
            .await?
            .ok_or_else(|| DbError::not_found("Cart", cart_id))?;

        let claimed = sqlx::query("UPDATE carts SET is_active = 0 WHERE id = ?1 AND is_active = 1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        if claimed.rows_affected() == 0 {
            return Err(CoreError::InactiveCart(cart_id.to_string()).into());
        }

        let cart_lines = active_lines(&mut tx, cart_id).await?;
        if cart_lines.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        for line in &cart_lines {
            take_stock(&mut tx, &line.product_id, line.quantity).await?;
        }

        let order_id = generate_id();
        let lines: Vec<OrderLine> = cart_lines
            .iter()
            .map(|l| OrderLine {
                id: generate_id(),
                order_id: order_id.clone(),
                product_id: l.product_id.clone(),
                quantity: l.quantity,
                unit_price_cents: l.unit_price_cents,
                original_price_cents: l.original_price_cents,
                offer_discount_cents: l.offer_discount_cents,
                offer_name: l.offer_name.clone(),
                subtotal_cents: l.subtotal_cents,
            })
            .collect();

        let order = write_order(&mut tx, &order_id, &cart.user_id, &lines, Utc::now()).await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            cart_id = %cart_id,
            lines = lines.len(),
            discount_pct = order.discount_pct,
            total_cents = order.total_cents,
            "Cart converted to order"
        );

        Ok(OrderWithLines { order, lines })
    }

    /// Creates an order directly from `(product_id, quantity)` pairs,
    /// resolving prices now.
    pub async fn create_order(&self, user_id: &str, items: &[(String, i64)]) -> DbResult<OrderWithLines> {
        if items.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        for (_, quantity) in items {
            validate_quantity(*quantity)?;
        }

        let now = Utc::now();
        let order_id = generate_id();
        let mut tx = begin_write(&self.pool).await?;

        let mut lines = Vec::with_capacity(items.len());
        for (product_id, quantity) in items {
            lines.push(priced_line(&mut tx, &order_id, product_id, *quantity, now).await?);
        }

        let order = write_order(&mut tx, &order_id, user_id, &lines, now).await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            user_id = %user_id,
            lines = lines.len(),
            total_cents = order.total_cents,
            "Order created"
        );

        Ok(OrderWithLines { order, lines })
    }

    /// Adds a line to an existing order and recomputes its total.
    pub async fn add_line(&self, order_id: &str, product_id: &str, quantity: i64) -> DbResult<OrderWithLines> {
        validate_quantity(quantity)?;

        let mut tx = begin_write(&self.pool).await?;

        let order = fetch_order(&mut tx, order_id)
            .await?
            .filter(|o| o.is_active)
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        let line = priced_line(&mut tx, &order.id, product_id, quantity, Utc::now()).await?;
        insert_order_line(&mut tx, &line).await?;
        let totals = store_totals(&mut tx, order_id).await?;

        tx.commit().await?;

        info!(
            order_id = %order_id,
            product_id = %product_id,
            quantity,
            total_cents = totals.total.cents(),
            "Line added to order"
        );

        self.require(order_id).await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Lists active orders, newest first; all users when `user_id` is `None`.
    pub async fn list(&self, user_id: Option<&str>) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE is_active = 1 AND (?1 IS NULL OR user_id = ?1) \
             ORDER BY created_at DESC"
        );

        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    pub async fn get_with_lines(&self, id: &str) -> DbResult<Option<OrderWithLines>> {
        let mut conn = self.pool.acquire().await?;

        let Some(order) = fetch_order(&mut conn, id).await? else {
            return Ok(None);
        };
        let lines = order_lines(&mut conn, id).await?;

        Ok(Some(OrderWithLines { order, lines }))
    }

    pub async fn lines(&self, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let mut conn = self.pool.acquire().await?;
        order_lines(&mut conn, order_id).await
    }

    /// Product ids of every active order, grouped per order, oldest first.
    ///
    /// Input for the purchase-combination dataset.
    pub async fn order_products(&self) -> DbResult<Vec<(String, Vec<String>)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT ol.order_id, ol.product_id
            FROM order_lines ol
            JOIN orders o ON o.id = ol.order_id
            WHERE o.is_active = 1
            ORDER BY o.created_at, ol.order_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for (order_id, product_id) in rows {
            match grouped.last_mut() {
                Some((current, products)) if *current == order_id => products.push(product_id),
                _ => grouped.push((order_id, vec![product_id])),
            }
        }

        Ok(grouped)
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Stores a 1–5 rating on the order.
    pub async fn rate(&self, id: &str, rating: i64) -> DbResult<Order> {
        validate_rating(rating)?;

        let result = sqlx::query("UPDATE orders SET rating = ?2 WHERE id = ?1 AND is_active = 1")
            .bind(id)
            .bind(rating)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }

        info!(order_id = %id, rating, "Order rated");
        Ok(self.require(id).await?.order)
    }

    /// Recomputes tier and total from the stored lines.
    pub async fn recalculate(&self, id: &str) -> DbResult<OrderWithLines> {
        let mut tx = begin_write(&self.pool).await?;

        if fetch_order(&mut tx, id).await?.is_none() {
            return Err(DbError::not_found("Order", id));
        }
        store_totals(&mut tx, id).await?;

        tx.commit().await?;
        self.require(id).await
    }

    async fn require(&self, id: &str) -> DbResult<OrderWithLines> {
        self.get_with_lines(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Takes `quantity` units out of stock, or fails without touching the row.
async fn take_stock(conn: &mut SqliteConnection, product_id: &str, quantity: i64) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE products SET stock = stock - ?2, updated_at = ?3 \
         WHERE id = ?1 AND is_active = 1 AND stock >= ?2",
    )
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let product = fetch_product(conn, product_id)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))?;

    warn!(
        product_id = %product_id,
        available = product.stock,
        requested = quantity,
        "Stock check failed during checkout"
    );

    if !product.is_active {
        return Err(CoreError::ProductUnavailable(product.name).into());
    }

    Err(CoreError::InsufficientStock {
        product: product.name,
        available: product.stock,
        requested: quantity,
    }
    .into())
}

/// Takes stock for a new order line and snapshots the product's price.
async fn priced_line(
    conn: &mut SqliteConnection,
    order_id: &str,
    product_id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<OrderLine> {
    take_stock(conn, product_id, quantity).await?;

    let product = fetch_product(conn, product_id)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))?;
    let snapshot = price_product(conn, &product, now).await?;

    Ok(OrderLine {
        id: generate_id(),
        order_id: order_id.to_string(),
        product_id: product_id.to_string(),
        quantity,
        unit_price_cents: snapshot.unit_price.cents(),
        original_price_cents: snapshot.original_price.cents(),
        offer_discount_cents: snapshot.discount.cents(),
        offer_name: snapshot.offer_name.clone(),
        subtotal_cents: snapshot.subtotal(quantity)?.cents(),
    })
}

/// Inserts the order row with its tier totals, then its lines.
async fn write_order(
    conn: &mut SqliteConnection,
    order_id: &str,
    user_id: &str,
    lines: &[OrderLine],
    now: DateTime<Utc>,
) -> DbResult<Order> {
    let totals = discount::order_totals(lines.iter().map(|l| Money::from_cents(l.subtotal_cents)));

    let order = Order {
        id: order_id.to_string(),
        user_id: user_id.to_string(),
        rating: None,
        discount_pct: totals.discount_pct,
        total_cents: totals.total.cents(),
        is_active: true,
        created_at: now,
    };

    sqlx::query(
        "INSERT INTO orders (id, user_id, rating, discount_pct, total_cents, is_active, created_at) \
         VALUES (?1, ?2, NULL, ?3, ?4, 1, ?5)",
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(order.discount_pct)
    .bind(order.total_cents)
    .bind(order.created_at)
    .execute(&mut *conn)
    .await?;

    for line in lines {
        insert_order_line(conn, line).await?;
    }

    Ok(order)
}

async fn insert_order_line(conn: &mut SqliteConnection, line: &OrderLine) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_lines (
            id, order_id, product_id, quantity,
            unit_price_cents, original_price_cents, offer_discount_cents, offer_name,
            subtotal_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&line.id)
    .bind(&line.order_id)
    .bind(&line.product_id)
    .bind(line.quantity)
    .bind(line.unit_price_cents)
    .bind(line.original_price_cents)
    .bind(line.offer_discount_cents)
    .bind(&line.offer_name)
    .bind(line.subtotal_cents)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Recomputes tier and total from the order's stored lines.
async fn store_totals(conn: &mut SqliteConnection, order_id: &str) -> DbResult<OrderTotals> {
    let subtotals: Vec<i64> =
        sqlx::query_scalar("SELECT subtotal_cents FROM order_lines WHERE order_id = ?1")
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;

    let totals = discount::order_totals(subtotals.into_iter().map(Money::from_cents));

    sqlx::query("UPDATE orders SET discount_pct = ?2, total_cents = ?3 WHERE id = ?1")
        .bind(order_id)
        .bind(totals.discount_pct)
        .bind(totals.total.cents())
        .execute(&mut *conn)
        .await?;

    debug!(
        order_id = %order_id,
        subtotal_cents = totals.subtotal.cents(),
        discount_pct = totals.discount_pct,
        "Order totals stored"
    );
    Ok(totals)
}

async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");

    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(order)
}

async fn order_lines(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderLine>> {
    let sql = format!("SELECT {ORDER_LINE_COLUMNS} FROM order_lines WHERE order_id = ?1 ORDER BY rowid");

    let lines = sqlx::query_as::<_, OrderLine>(&sql)
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(lines)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::{Database, DbConfig};

    async fn stock_of(db: &Database, product_id: &str) -> i64 {
        db.products().get_by_id(product_id).await.unwrap().unwrap().stock
    }

    async fn order_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_convert_cart() {
        let db = fixtures::db().await;
        let user = fixtures::user(&db, "ana@example.com").await;
        let dune = fixtures::product(&db, "Dune", 2500, 10).await;
        let hobbit = fixtures::product(&db, "The Hobbit", 1500, 5).await;

        let cart = db.carts().create(&user.id).await.unwrap();
        db.carts().add_product(&cart.id, &dune.id, 2).await.unwrap();
        db.carts().add_product(&cart.id, &hobbit.id, 1).await.unwrap();

        let result = db.orders().convert_cart(&cart.id).await.unwrap();

        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.order.user_id, user.id);
        assert_eq!(result.subtotal().cents(), 6500);
        assert_eq!(result.order.discount_pct, 0);
        assert_eq!(result.order.total_cents, 6500);

        assert_eq!(stock_of(&db, &dune.id).await, 8);
        assert_eq!(stock_of(&db, &hobbit.id).await, 4);

        let cart = db.carts().get_by_id(&cart.id).await.unwrap().unwrap();
        assert!(!cart.is_active);
    }

    #[tokio::test]
    async fn test_seven_hundred_gets_quarter_off() {
        let db = fixtures::db().await;
        let user = fixtures::user(&db, "ana@example.com").await;
        let product = fixtures::product(&db, "Encyclopedia", 10000, 10).await;

        let cart = db.carts().create(&user.id).await.unwrap();
        db.carts().add_product(&cart.id, &product.id, 7).await.unwrap();

        let result = db.orders().convert_cart(&cart.id).await.unwrap();

        assert_eq!(result.lines[0].subtotal_cents, 70000);
        assert_eq!(result.order.discount_pct, 25);
        assert_eq!(result.order.total_cents, 52500);
    }

    #[tokio::test]
    async fn test_exactly_two_hundred_gets_no_discount() {
        let db = fixtures::db().await;
        let user = fixtures::user(&db, "ana@example.com").await;
        let product = fixtures::product(&db, "Atlas", 10000, 10).await;

        let order = db
            .orders()
            .create_order(&user.id, &[(product.id.clone(), 2)])
            .await
            .unwrap();

        assert_eq!(order.order.discount_pct, 0);
        assert_eq!(order.order.total_cents, 20000);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_everything_back() {
        let db = fixtures::db().await;
        let user = fixtures::user(&db, "ana@example.com").await;
        let plenty = fixtures::product(&db, "Plenty", 1000, 10).await;
        let scarce = fixtures::product(&db, "Scarce", 1000, 5).await;

        let cart = db.carts().create(&user.id).await.unwrap();
        db.carts().add_product(&cart.id, &plenty.id, 3).await.unwrap();
        db.carts().add_product(&cart.id, &scarce.id, 4).await.unwrap();

        // Someone else bought most of the scarce stock in the meantime
        sqlx::query("UPDATE products SET stock = 1 WHERE id = ?1")
            .bind(&scarce.id)
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.orders().convert_cart(&cart.id).await.unwrap_err();
        match err {
            DbError::Core(CoreError::InsufficientStock {
                product,
                available,
                requested,
            }) => {
                assert_eq!(product, "Scarce");
                assert_eq!(available, 1);
                assert_eq!(requested, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(stock_of(&db, &plenty.id).await, 10);
        assert_eq!(stock_of(&db, &scarce.id).await, 1);
        assert_eq!(order_count(&db).await, 0);

        let cart = db.carts().get_by_id(&cart.id).await.unwrap().unwrap();
        assert!(cart.is_active);
        assert_eq!(db.carts().lines(&cart.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cart_converts_only_once() {
        let db = fixtures::db().await;
        let user = fixtures::user(&db, "ana@example.com").await;
        let product = fixtures::product(&db, "Dune", 2500, 10).await;

        let cart = db.carts().create(&user.id).await.unwrap();
        db.carts().add_product(&cart.id, &product.id, 1).await.unwrap();

        db.orders().convert_cart(&cart.id).await.unwrap();
        let second = db.orders().convert_cart(&cart.id).await;

        assert!(matches!(second, Err(DbError::Core(CoreError::InactiveCart(_)))));
        assert_eq!(stock_of(&db, &product.id).await, 9);
        assert_eq!(order_count(&db).await, 1);
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected_and_stays_active() {
        let db = fixtures::db().await;
        let user = fixtures::user(&db, "ana@example.com").await;
        let cart = db.carts().create(&user.id).await.unwrap();

        let err = db.orders().convert_cart(&cart.id).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::EmptyCart)));

        let cart = db.carts().get_by_id(&cart.id).await.unwrap().unwrap();
        assert!(cart.is_active);
    }

    #[tokio::test]
    async fn test_order_is_immune_to_later_price_changes() {
        let db = fixtures::db().await;
        let user = fixtures::user(&db, "ana@example.com").await;
        let product = fixtures::product(&db, "Dune", 2500, 10).await;
        let offer = fixtures::current_offer(&db, "Spring", 500).await;
        db.products().set_offer(&product.id, Some(&offer.id)).await.unwrap();

        let cart = db.carts().create(&user.id).await.unwrap();
        db.carts().add_product(&cart.id, &product.id, 2).await.unwrap();
        let converted = db.orders().convert_cart(&cart.id).await.unwrap();

        db.offers().soft_delete(&offer.id).await.unwrap();
        sqlx::query("UPDATE products SET price_cents = 9999 WHERE id = ?1")
            .bind(&product.id)
            .execute(db.pool())
            .await
            .unwrap();

        let stored = db.orders().recalculate(&converted.order.id).await.unwrap();
        assert_eq!(stored.lines[0].unit_price_cents, 2000);
        assert_eq!(stored.lines[0].offer_name.as_deref(), Some("Spring"));
        assert_eq!(stored.order.total_cents, 4000);
    }

    #[tokio::test]
    async fn test_add_line_recomputes_tier() {
        let db = fixtures::db().await;
        let user = fixtures::user(&db, "ana@example.com").await;
        let product = fixtures::product(&db, "Atlas", 10000, 10).await;

        let order = db
            .orders()
            .create_order(&user.id, &[(product.id.clone(), 2)])
            .await
            .unwrap();
        assert_eq!(order.order.discount_pct, 0);

        let grown = db.orders().add_line(&order.order.id, &product.id, 3).await.unwrap();

        assert_eq!(grown.lines.len(), 2);
        assert_eq!(grown.subtotal().cents(), 50000);
        assert_eq!(grown.order.discount_pct, 15);
        assert_eq!(grown.order.total_cents, 42500);
        assert_eq!(stock_of(&db, &product.id).await, 5);
    }

    #[tokio::test]
    async fn test_rating_bounds() {
        let db = fixtures::db().await;
        let user = fixtures::user(&db, "ana@example.com").await;
        let product = fixtures::product(&db, "Dune", 2500, 10).await;
        let order = db
            .orders()
            .create_order(&user.id, &[(product.id.clone(), 1)])
            .await
            .unwrap();

        assert!(db.orders().rate(&order.order.id, 6).await.is_err());
        assert!(db.orders().rate(&order.order.id, 0).await.is_err());

        let rated = db.orders().rate(&order.order.id, 5).await.unwrap();
        assert_eq!(rated.rating, Some(5));
    }

    #[tokio::test]
    async fn test_list_and_order_products() {
        let db = fixtures::db().await;
        let ana = fixtures::user(&db, "ana@example.com").await;
        let bob = fixtures::user(&db, "bob@example.com").await;
        let a = fixtures::product(&db, "A", 100, 10).await;
        let b = fixtures::product(&db, "B", 100, 10).await;

        db.orders()
            .create_order(&ana.id, &[(a.id.clone(), 1), (b.id.clone(), 1)])
            .await
            .unwrap();
        db.orders().create_order(&bob.id, &[(a.id.clone(), 1)]).await.unwrap();

        assert_eq!(db.orders().list(None).await.unwrap().len(), 2);
        assert_eq!(db.orders().list(Some(&ana.id)).await.unwrap().len(), 1);

        let grouped = db.orders().order_products().await.unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.iter().map(|(_, p)| p.len()).sum::<usize>(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_queue_on_the_write_lock() {
        let path = std::env::temp_dir().join(format!("libreria-checkout-{}.db", generate_id()));
        let db = Database::new(DbConfig::new(&path).max_connections(8)).await.unwrap();
        let user = fixtures::user(&db, "ana@example.com").await;
        let product = fixtures::product(&db, "Dune", 2500, 10_000).await;

        let mut cart_ids = Vec::new();
        for _ in 0..40 {
            let cart = db.carts().create(&user.id).await.unwrap();
            db.carts().add_product(&cart.id, &product.id, 1).await.unwrap();
            cart_ids.push(cart.id);
        }

        let handles: Vec<_> = cart_ids
            .into_iter()
            .map(|cart_id| {
                let db = db.clone();
                tokio::spawn(async move { db.orders().convert_cart(&cart_id).await })
            })
            .collect();

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(result.is_ok(), "checkout failed: {result:?}");
        }

        assert_eq!(stock_of(&db, &product.id).await, 10_000 - 40);
        assert_eq!(order_count(&db).await, 40);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_never_oversell() {
        let path = std::env::temp_dir().join(format!("libreria-oversell-{}.db", generate_id()));
        let db = Database::new(DbConfig::new(&path).max_connections(8)).await.unwrap();
        let user = fixtures::user(&db, "ana@example.com").await;
        let product = fixtures::product(&db, "Scarce", 1000, 5).await;

        let mut cart_ids = Vec::new();
        for _ in 0..12 {
            let cart = db.carts().create(&user.id).await.unwrap();
            db.carts().add_product(&cart.id, &product.id, 1).await.unwrap();
            cart_ids.push(cart.id);
        }

        let handles: Vec<_> = cart_ids
            .into_iter()
            .map(|cart_id| {
                let db = db.clone();
                tokio::spawn(async move { db.orders().convert_cart(&cart_id).await })
            })
            .collect();

        let mut sold = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => sold += 1,
                Err(DbError::Core(CoreError::InsufficientStock { .. })) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(sold, 5);
        assert_eq!(stock_of(&db, &product.id).await, 0);
        assert_eq!(order_count(&db).await, 5);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
