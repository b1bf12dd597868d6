//! # Report Repository
//!
//! Sales aggregations over active orders.
//!
//! Every query takes a [`DateRange`]; an open end means "no bound on that
//! side". Timestamps are stored as RFC 3339 text, so range filters compare
//! strings and period grouping uses SQLite's date functions.
//!
//! ## Period Keys
//! ```text
//! Grouping::Day    →  2024-01-17
//! Grouping::Week   →  2024-01-15   (Monday the week starts on)
//! Grouping::Month  →  2024-01
//! Grouping::Year   →  2024
//! ```

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use libreria_core::reports::DateRange;
use libreria_core::Grouping;

use crate::error::DbResult;

/// Products with this many units or fewer count as low stock on the dashboard.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// Orders in range. Binds: ?1 start, ?2 end.
const ORDER_FILTER: &str =
    "o.is_active = 1 AND (?1 IS NULL OR o.created_at >= ?1) AND (?2 IS NULL OR o.created_at <= ?2)";

// =============================================================================
// Row types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct BestSeller {
    pub product_id: String,
    pub product_name: String,
    pub category_name: Option<String>,
    pub units_sold: i64,
    pub order_count: i64,
    pub revenue_cents: i64,
    pub average_price_cents: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct PeriodSales {
    pub period: String,
    pub order_count: i64,
    pub units_sold: i64,
    pub revenue_cents: i64,
    pub average_order_cents: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct SalesSummary {
    pub order_count: i64,
    pub revenue_cents: i64,
    pub average_order_cents: f64,
    pub units_sold: i64,
    pub customer_count: i64,
    /// `None` when no order in range was rated.
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct TopCustomer {
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    pub order_count: i64,
    pub total_spent_cents: i64,
    pub average_order_cents: f64,
    pub last_order_at: String,
}

/// Aggregate over a set of order lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow)]
pub struct LineStats {
    pub line_count: i64,
    pub units_sold: i64,
    pub revenue_cents: i64,
    /// Σ offer discount × quantity.
    pub savings_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct OfferStats {
    pub offer_name: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub stats: LineStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferEffectiveness {
    pub with_offer: LineStats,
    pub without_offer: LineStats,
    pub by_offer: Vec<OfferStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub today: SalesSummary,
    pub this_month: SalesSummary,
    pub active_products: i64,
    pub low_stock_products: i64,
    pub active_offers: i64,
    pub best_sellers_this_month: Vec<BestSeller>,
}

#[derive(FromRow)]
struct SplitRow {
    with_offer: i64,
    #[sqlx(flatten)]
    stats: LineStats,
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Products ranked by units sold, then revenue.
    pub async fn best_sellers(&self, range: &DateRange, limit: i64) -> DbResult<Vec<BestSeller>> {
        let sql = format!(
            r#"
            SELECT
                p.id AS product_id,
                p.name AS product_name,
                c.name AS category_name,
                SUM(ol.quantity) AS units_sold,
                COUNT(DISTINCT ol.order_id) AS order_count,
                SUM(ol.subtotal_cents) AS revenue_cents,
                CAST(AVG(ol.unit_price_cents) AS REAL) AS average_price_cents
            FROM order_lines ol
            JOIN orders o ON o.id = ol.order_id
            JOIN products p ON p.id = ol.product_id
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE {ORDER_FILTER}
            GROUP BY p.id, p.name, c.name
            ORDER BY units_sold DESC, revenue_cents DESC, p.name
            LIMIT ?3
            "#
        );

        let rows = sqlx::query_as::<_, BestSeller>(&sql)
            .bind(range.start)
            .bind(range.end)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = rows.len(), limit, "Best sellers computed");
        Ok(rows)
    }

    /// Order count and revenue per day, week, month or year, oldest first.
    pub async fn sales_by_period(&self, range: &DateRange, grouping: Grouping) -> DbResult<Vec<PeriodSales>> {
        let period = period_expr(grouping);

        let sql = format!(
            r#"
            SELECT
                {period} AS period,
                COUNT(*) AS order_count,
                COALESCE(SUM(u.units), 0) AS units_sold,
                COALESCE(SUM(o.total_cents), 0) AS revenue_cents,
                CAST(COALESCE(AVG(o.total_cents), 0) AS REAL) AS average_order_cents
            FROM orders o
            LEFT JOIN (
                SELECT order_id, SUM(quantity) AS units FROM order_lines GROUP BY order_id
            ) u ON u.order_id = o.id
            WHERE {ORDER_FILTER}
            GROUP BY period
            ORDER BY period
            "#
        );

        let rows = sqlx::query_as::<_, PeriodSales>(&sql)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;

        debug!(grouping = grouping.as_str(), periods = rows.len(), "Sales grouped by period");
        Ok(rows)
    }

    /// Headline numbers for a range.
    pub async fn summary(&self, range: &DateRange) -> DbResult<SalesSummary> {
        let sql = format!(
            r#"
            SELECT
                COUNT(*) AS order_count,
                COALESCE(SUM(o.total_cents), 0) AS revenue_cents,
                CAST(COALESCE(AVG(o.total_cents), 0) AS REAL) AS average_order_cents,
                COALESCE((
                    SELECT SUM(ol.quantity)
                    FROM order_lines ol
                    JOIN orders o ON o.id = ol.order_id
                    WHERE {ORDER_FILTER}
                ), 0) AS units_sold,
                COUNT(DISTINCT o.user_id) AS customer_count,
                CAST(AVG(o.rating) AS REAL) AS average_rating
            FROM orders o
            WHERE {ORDER_FILTER}
            "#
        );

        let summary = sqlx::query_as::<_, SalesSummary>(&sql)
            .bind(range.start)
            .bind(range.end)
            .fetch_one(&self.pool)
            .await?;

        Ok(summary)
    }

    /// Customers ranked by total spent.
    pub async fn top_customers(&self, range: &DateRange, limit: i64) -> DbResult<Vec<TopCustomer>> {
        let sql = format!(
            r#"
            SELECT
                u.id AS user_id,
                u.full_name,
                u.email,
                COUNT(o.id) AS order_count,
                SUM(o.total_cents) AS total_spent_cents,
                CAST(AVG(o.total_cents) AS REAL) AS average_order_cents,
                MAX(o.created_at) AS last_order_at
            FROM orders o
            JOIN users u ON u.id = o.user_id
            WHERE {ORDER_FILTER}
            GROUP BY u.id, u.full_name, u.email
            ORDER BY total_spent_cents DESC, order_count DESC
            LIMIT ?3
            "#
        );

        let rows = sqlx::query_as::<_, TopCustomer>(&sql)
            .bind(range.start)
            .bind(range.end)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Compares lines sold with an offer against lines sold at full price.
    pub async fn offer_effectiveness(&self, range: &DateRange) -> DbResult<OfferEffectiveness> {
        const STATS: &str = r#"
                COUNT(*) AS line_count,
                COALESCE(SUM(ol.quantity), 0) AS units_sold,
                COALESCE(SUM(ol.subtotal_cents), 0) AS revenue_cents,
                COALESCE(SUM(ol.offer_discount_cents * ol.quantity), 0) AS savings_cents
        "#;

        let split_sql = format!(
            r#"
            SELECT
                CASE WHEN ol.offer_discount_cents > 0 THEN 1 ELSE 0 END AS with_offer,
                {STATS}
            FROM order_lines ol
            JOIN orders o ON o.id = ol.order_id
            WHERE {ORDER_FILTER}
            GROUP BY with_offer
            "#
        );

        let split = sqlx::query_as::<_, SplitRow>(&split_sql)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;

        let by_offer_sql = format!(
            r#"
            SELECT
                ol.offer_name,
                {STATS}
            FROM order_lines ol
            JOIN orders o ON o.id = ol.order_id
            WHERE {ORDER_FILTER}
              AND ol.offer_name IS NOT NULL
              AND ol.offer_discount_cents > 0
            GROUP BY ol.offer_name
            ORDER BY revenue_cents DESC
            "#
        );

        let by_offer = sqlx::query_as::<_, OfferStats>(&by_offer_sql)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;

        let mut with_offer = LineStats::default();
        let mut without_offer = LineStats::default();
        for row in split {
            if row.with_offer == 1 {
                with_offer = row.stats;
            } else {
                without_offer = row.stats;
            }
        }

        Ok(OfferEffectiveness {
            with_offer,
            without_offer,
            by_offer,
        })
    }

    /// Today, this month, catalog health and the month's best sellers.
    pub async fn dashboard(&self, now: DateTime<Utc>) -> DbResult<Dashboard> {
        let today_start = Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
            .single()
            .unwrap_or(now - Duration::days(1));
        let month_start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now - Duration::days(30));

        let today = DateRange::between(today_start, now);
        let month = DateRange::between(month_start, now);

        let (active_products, low_stock_products, active_offers): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM products WHERE is_active = 1),
                (SELECT COUNT(*) FROM products WHERE is_active = 1 AND stock <= ?1),
                (SELECT COUNT(*) FROM offers
                   WHERE is_active = 1 AND starts_at <= ?2 AND ends_at >= ?2)
            "#,
        )
        .bind(LOW_STOCK_THRESHOLD)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(Dashboard {
            today: self.summary(&today).await?,
            this_month: self.summary(&month).await?,
            active_products,
            low_stock_products,
            active_offers,
            best_sellers_this_month: self.best_sellers(&month, 5).await?,
        })
    }
}

fn period_expr(grouping: Grouping) -> &'static str {
    match grouping {
        Grouping::Day => "strftime('%Y-%m-%d', o.created_at)",
        Grouping::Week => "date(o.created_at, 'weekday 0', '-6 days')",
        Grouping::Month => "strftime('%Y-%m', o.created_at)",
        Grouping::Year => "strftime('%Y', o.created_at)",
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::Database;

    async fn backdate(db: &Database, order_id: &str, when: &str) {
        sqlx::query("UPDATE orders SET created_at = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(when)
            .execute(db.pool())
            .await
            .unwrap();
    }

    fn january() -> DateRange {
        DateRange::between(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_best_sellers_ranked_by_units() {
        let db = fixtures::db().await;
        let user = fixtures::user(&db, "ana@example.com").await;
        let dune = fixtures::product(&db, "Dune", 2500, 100).await;
        let hobbit = fixtures::product(&db, "The Hobbit", 1500, 100).await;

        db.orders()
            .create_order(&user.id, &[(dune.id.clone(), 1), (hobbit.id.clone(), 3)])
            .await
            .unwrap();
        db.orders().create_order(&user.id, &[(hobbit.id.clone(), 2)]).await.unwrap();

        let rows = db.reports().best_sellers(&DateRange::default(), 10).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].product_name, "The Hobbit");
        assert_eq!(rows[0].units_sold, 5);
        assert_eq!(rows[0].order_count, 2);
        assert_eq!(rows[0].revenue_cents, 7500);
        assert_eq!(rows[0].average_price_cents, 1500.0);

        let limited = db.reports().best_sellers(&DateRange::default(), 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_sales_by_period_groupings() {
        let db = fixtures::db().await;
        let user = fixtures::user(&db, "ana@example.com").await;
        let product = fixtures::product(&db, "Dune", 1000, 100).await;

        for day in ["2024-01-15T10:00:00+00:00", "2024-01-17T10:00:00+00:00", "2024-01-21T23:00:00+00:00"] {
            let order = db.orders().create_order(&user.id, &[(product.id.clone(), 1)]).await.unwrap();
            backdate(&db, &order.order.id, day).await;
        }

        let by_day = db.reports().sales_by_period(&january(), Grouping::Day).await.unwrap();
        assert_eq!(by_day.len(), 3);
        assert_eq!(by_day[0].period, "2024-01-15");

        // 15th is a Monday and the 21st the Sunday of the same week
        let by_week = db.reports().sales_by_period(&january(), Grouping::Week).await.unwrap();
        assert_eq!(by_week.len(), 1);
        assert_eq!(by_week[0].period, "2024-01-15");
        assert_eq!(by_week[0].order_count, 3);
        assert_eq!(by_week[0].units_sold, 3);
        assert_eq!(by_week[0].revenue_cents, 3000);

        let by_month = db.reports().sales_by_period(&january(), Grouping::Month).await.unwrap();
        assert_eq!(by_month[0].period, "2024-01");

        let by_year = db.reports().sales_by_period(&january(), Grouping::Year).await.unwrap();
        assert_eq!(by_year[0].period, "2024");
    }

    #[tokio::test]
    async fn test_range_excludes_orders_outside() {
        let db = fixtures::db().await;
        let user = fixtures::user(&db, "ana@example.com").await;
        let product = fixtures::product(&db, "Dune", 1000, 100).await;

        let inside = db.orders().create_order(&user.id, &[(product.id.clone(), 1)]).await.unwrap();
        backdate(&db, &inside.order.id, "2024-01-10T12:00:00+00:00").await;
        // Left at today's date, outside January 2024
        db.orders().create_order(&user.id, &[(product.id.clone(), 2)]).await.unwrap();

        let summary = db.reports().summary(&january()).await.unwrap();
        assert_eq!(summary.order_count, 1);
        assert_eq!(summary.units_sold, 1);
        assert_eq!(summary.revenue_cents, 1000);

        let all = db.reports().summary(&DateRange::default()).await.unwrap();
        assert_eq!(all.order_count, 2);
        assert_eq!(all.units_sold, 3);
        assert_eq!(all.customer_count, 1);
    }

    #[tokio::test]
    async fn test_summary_of_nothing() {
        let db = fixtures::db().await;

        let summary = db.reports().summary(&DateRange::default()).await.unwrap();

        assert_eq!(summary.order_count, 0);
        assert_eq!(summary.revenue_cents, 0);
        assert_eq!(summary.average_order_cents, 0.0);
        assert!(summary.average_rating.is_none());
    }

    #[tokio::test]
    async fn test_top_customers() {
        let db = fixtures::db().await;
        let ana = fixtures::user(&db, "ana@example.com").await;
        let bob = fixtures::user(&db, "bob@example.com").await;
        let product = fixtures::product(&db, "Dune", 1000, 100).await;

        db.orders().create_order(&ana.id, &[(product.id.clone(), 1)]).await.unwrap();
        db.orders().create_order(&bob.id, &[(product.id.clone(), 5)]).await.unwrap();

        let rows = db.reports().top_customers(&DateRange::default(), 10).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].email, "bob@example.com");
        assert_eq!(rows[0].total_spent_cents, 5000);
    }

    #[tokio::test]
    async fn test_offer_effectiveness_split() {
        let db = fixtures::db().await;
        let user = fixtures::user(&db, "ana@example.com").await;
        let discounted = fixtures::product(&db, "Dune", 2500, 100).await;
        let full_price = fixtures::product(&db, "Cosmos", 2000, 100).await;
        let offer = fixtures::current_offer(&db, "Spring", 500).await;
        db.products().set_offer(&discounted.id, Some(&offer.id)).await.unwrap();

        db.orders()
            .create_order(&user.id, &[(discounted.id.clone(), 2), (full_price.id.clone(), 1)])
            .await
            .unwrap();

        let report = db.reports().offer_effectiveness(&DateRange::default()).await.unwrap();

        assert_eq!(report.with_offer.units_sold, 2);
        assert_eq!(report.with_offer.revenue_cents, 4000);
        assert_eq!(report.with_offer.savings_cents, 1000);
        assert_eq!(report.without_offer.units_sold, 1);
        assert_eq!(report.by_offer.len(), 1);
        assert_eq!(report.by_offer[0].offer_name, "Spring");
    }

    #[tokio::test]
    async fn test_dashboard() {
        let db = fixtures::db().await;
        let user = fixtures::user(&db, "ana@example.com").await;
        let product = fixtures::product(&db, "Dune", 1000, 7).await;
        fixtures::product(&db, "Cosmos", 1000, 50).await;
        fixtures::current_offer(&db, "Spring", 100).await;

        db.orders().create_order(&user.id, &[(product.id.clone(), 3)]).await.unwrap();

        let dashboard = db.reports().dashboard(Utc::now()).await.unwrap();

        assert_eq!(dashboard.today.order_count, 1);
        assert_eq!(dashboard.this_month.order_count, 1);
        assert_eq!(dashboard.active_products, 2);
        assert_eq!(dashboard.low_stock_products, 1);
        assert_eq!(dashboard.active_offers, 1);
        assert_eq!(dashboard.best_sellers_this_month[0].product_name, "Dune");
    }
}
