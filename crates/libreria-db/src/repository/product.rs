//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Filtered listing (category, genre, author, publisher, name search)
//! - CRUD with the accessories rule and case-insensitive unique names
//! - Attaching and detaching offers
//! - Price resolution helpers shared with carts and orders
//!
//! ## Price Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products.offer_id ──► offers row ──► pricing::resolve(product, offer)  │
//! │                                              │                          │
//! │                                              ▼                          │
//! │                          PriceSnapshot { unit, original, discount }     │
//! │                                              │                          │
//! │                     copied onto cart_lines when the line is saved       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use libreria_core::pricing::{self, PriceSnapshot};
use libreria_core::validation::{
    validate_name, validate_price_cents, validate_product_links, validate_stock,
};
use libreria_core::{Offer, Product};

use super::generate_id;
use super::offer::OFFER_COLUMNS;
use crate::error::{DbError, DbResult};

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, description, stock, price_cents, image_url, \
     category_id, genre_id, author_id, publisher_id, offer_id, is_active, created_at, updated_at";

/// Fields supplied when creating or replacing a product.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stock: i64,
    pub price_cents: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub genre_id: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub publisher_id: Option<String>,
    #[serde(default)]
    pub offer_id: Option<String>,
}

/// Optional filters for [`ProductRepository::list`]. All set filters must match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    #[serde(default, alias = "categoria")]
    pub category_id: Option<String>,
    #[serde(default, alias = "genero")]
    pub genre_id: Option<String>,
    #[serde(default, alias = "autor")]
    pub author_id: Option<String>,
    #[serde(default, alias = "editorial")]
    pub publisher_id: Option<String>,
    /// Substring of the product name, any letter case.
    #[serde(default, alias = "buscar")]
    pub search: Option<String>,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let fantasy = repo.list(&ProductFilter { genre_id: Some(id), ..Default::default() }).await?;
/// let product = repo.get_by_id("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists active products ordered by name.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        debug!(?filter, "Listing products");

        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE is_active = 1
              AND (?1 IS NULL OR category_id = ?1)
              AND (?2 IS NULL OR genre_id = ?2)
              AND (?3 IS NULL OR author_id = ?3)
              AND (?4 IS NULL OR publisher_id = ?4)
              AND (?5 IS NULL OR name LIKE ?5)
            ORDER BY name
            "#
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&filter.category_id)
            .bind(&filter.genre_id)
            .bind(&filter.author_id)
            .bind(&filter.publisher_id)
            .bind(search)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Gets a product by its ID, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    /// Fetches the active products among `ids`, in the order given.
    ///
    /// Unknown and inactive ids are skipped.
    pub async fn get_by_ids(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 AND id IN ("
        ));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let found = query
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;

        let ordered = ids
            .iter()
            .filter_map(|id| found.iter().find(|p| &p.id == id).cloned())
            .collect();

        Ok(ordered)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - name already taken (any letter case)
    /// * `Err(DbError::Core(..))` - validation failed, e.g. an accessory with an author
    pub async fn insert(&self, new: &NewProduct) -> DbResult<Product> {
        let name = self.validate(new, None).await?;

        let now = Utc::now();
        let product = Product {
            id: generate_id(),
            name,
            description: new.description.trim().to_string(),
            stock: new.stock,
            price_cents: new.price_cents,
            image_url: new.image_url.clone(),
            category_id: new.category_id.clone(),
            genre_id: new.genre_id.clone(),
            author_id: new.author_id.clone(),
            publisher_id: new.publisher_id.clone(),
            offer_id: new.offer_id.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, stock, price_cents, image_url,
                category_id, genre_id, author_id, publisher_id, offer_id,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1, ?12, ?13)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.stock)
        .bind(product.price_cents)
        .bind(&product.image_url)
        .bind(&product.category_id)
        .bind(&product.genre_id)
        .bind(&product.author_id)
        .bind(&product.publisher_id)
        .bind(&product.offer_id)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Replaces every editable field of a product.
    ///
    /// Lines already in carts or orders keep their price snapshots.
    pub async fn update(&self, id: &str, changes: &NewProduct) -> DbResult<Product> {
        let name = self.validate(changes, Some(id)).await?;

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                description = ?3,
                stock = ?4,
                price_cents = ?5,
                image_url = ?6,
                category_id = ?7,
                genre_id = ?8,
                author_id = ?9,
                publisher_id = ?10,
                offer_id = ?11,
                updated_at = ?12
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(changes.description.trim())
        .bind(changes.stock)
        .bind(changes.price_cents)
        .bind(&changes.image_url)
        .bind(&changes.category_id)
        .bind(&changes.genre_id)
        .bind(&changes.author_id)
        .bind(&changes.publisher_id)
        .bind(&changes.offer_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(id = %id, "Product updated");
        self.require(id).await
    }

    /// Links a product to an offer, or clears the link with `None`.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - product unknown, or offer unknown or inactive
    pub async fn set_offer(&self, id: &str, offer_id: Option<&str>) -> DbResult<Product> {
        if let Some(offer_id) = offer_id {
            let active: Option<bool> =
                sqlx::query_scalar("SELECT is_active FROM offers WHERE id = ?1")
                    .bind(offer_id)
                    .fetch_optional(&self.pool)
                    .await?;

            if active != Some(true) {
                return Err(DbError::not_found("Offer", offer_id));
            }
        }

        let result = sqlx::query("UPDATE products SET offer_id = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(offer_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id = %id, offer_id = ?offer_id, "Product offer changed");
        self.require(id).await
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Order lines keep referencing it.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id = %id, "Product deactivated");
        Ok(())
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Resolves the price a cart line would snapshot right now.
    pub async fn current_price(&self, product: &Product) -> DbResult<PriceSnapshot> {
        let mut conn = self.pool.acquire().await?;
        price_product(&mut conn, product, Utc::now()).await
    }

    async fn require(&self, id: &str) -> DbResult<Product> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Field rules, the accessories rule and name uniqueness. Returns the
    /// trimmed name.
    async fn validate(&self, new: &NewProduct, except_id: Option<&str>) -> DbResult<String> {
        let name = validate_name("name", &new.name)?;
        validate_price_cents(new.price_cents)?;
        validate_stock(new.stock)?;

        let category_name = match &new.category_id {
            Some(category_id) => Some(
                sqlx::query_scalar::<_, String>("SELECT name FROM categories WHERE id = ?1")
                    .bind(category_id)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or_else(|| DbError::not_found("Category", category_id))?,
            ),
            None => None,
        };

        validate_product_links(
            category_name.as_deref(),
            new.genre_id.is_some(),
            new.author_id.is_some(),
            new.publisher_id.is_some(),
        )?;

        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE name = ?1 AND (?2 IS NULL OR id <> ?2)",
        )
        .bind(&name)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;

        if taken > 0 {
            return Err(DbError::duplicate("name", name));
        }

        Ok(name)
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================
//
// These run on whatever connection the caller holds, so cart and order code
// can call them inside an open transaction.

pub(crate) async fn fetch_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");

    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(product)
}

pub(crate) async fn fetch_offer(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Offer>> {
    let sql = format!("SELECT {OFFER_COLUMNS} FROM offers WHERE id = ?1");

    let offer = sqlx::query_as::<_, Offer>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(offer)
}

/// Loads the product's offer (if any) and resolves its price at `now`.
pub(crate) async fn price_product(
    conn: &mut SqliteConnection,
    product: &Product,
    now: DateTime<Utc>,
) -> DbResult<PriceSnapshot> {
    let offer = match &product.offer_id {
        Some(offer_id) => fetch_offer(conn, offer_id).await?,
        None => None,
    };

    Ok(pricing::resolve(product, offer.as_ref(), now))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use libreria_core::{CatalogKind, CoreError, Money, ValidationError};

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = fixtures::db().await;
        let product = fixtures::product(&db, "Dune", 2500, 10).await;

        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Dune");
        assert_eq!(loaded.price(), Money::from_cents(2500));
        assert_eq!(loaded.stock, 10);
        assert!(loaded.is_active);
    }

    #[tokio::test]
    async fn test_duplicate_name_ignores_case() {
        let db = fixtures::db().await;
        fixtures::product(&db, "Dune", 2500, 10).await;

        let err = db
            .products()
            .insert(&NewProduct {
                name: "DUNE".to_string(),
                price_cents: 100,
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_negative_values_rejected() {
        let db = fixtures::db().await;

        let err = db
            .products()
            .insert(&NewProduct {
                name: "Bookmark".to_string(),
                price_cents: -1,
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_price_above_eight_digits_rejected() {
        let db = fixtures::db().await;

        let err = db
            .products()
            .insert(&NewProduct {
                name: "Gilded Folio".to_string(),
                price_cents: i64::MAX / 2,
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(db.products().count().await.unwrap(), 0);

        let top = fixtures::product(&db, "Folio", 99_999_999, 5).await;
        assert_eq!(top.price_cents, 99_999_999);
    }

    #[tokio::test]
    async fn test_accessories_cannot_have_author() {
        let db = fixtures::db().await;
        let accessories = db.catalog(CatalogKind::Category).create("Accessories").await.unwrap();
        let author = db.catalog(CatalogKind::Author).create("Tolkien").await.unwrap();

        let mut new = NewProduct {
            name: "Bookmark".to_string(),
            price_cents: 300,
            category_id: Some(accessories.id.clone()),
            author_id: Some(author.id),
            ..Default::default()
        };

        let err = db.products().insert(&new).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));

        new.author_id = None;
        assert!(db.products().insert(&new).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = fixtures::db().await;
        let fantasy = db.catalog(CatalogKind::Genre).create("Fantasy").await.unwrap();

        db.products()
            .insert(&NewProduct {
                name: "The Hobbit".to_string(),
                price_cents: 1500,
                genre_id: Some(fantasy.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        fixtures::product(&db, "Cosmos", 2000, 1).await;

        let by_genre = db
            .products()
            .list(&ProductFilter {
                genre_id: Some(fantasy.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_genre.len(), 1);
        assert_eq!(by_genre[0].name, "The Hobbit");

        let by_name = db
            .products()
            .list(&ProductFilter {
                search: Some("cos".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name, "Cosmos");

        assert_eq!(db.products().list(&ProductFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_set_and_clear_offer() {
        let db = fixtures::db().await;
        let product = fixtures::product(&db, "Dune", 2500, 10).await;
        let offer = fixtures::current_offer(&db, "Spring", 500).await;

        let linked = db.products().set_offer(&product.id, Some(&offer.id)).await.unwrap();
        assert_eq!(linked.offer_id.as_deref(), Some(offer.id.as_str()));

        let snapshot = db.products().current_price(&linked).await.unwrap();
        assert_eq!(snapshot.unit_price, Money::from_cents(2000));
        assert_eq!(snapshot.offer_name.as_deref(), Some("Spring"));

        let cleared = db.products().set_offer(&product.id, None).await.unwrap();
        assert!(cleared.offer_id.is_none());

        assert!(matches!(
            db.products().set_offer(&product.id, Some("missing")).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_offer_larger_than_price_resolves_to_zero() {
        let db = fixtures::db().await;
        let product = fixtures::product(&db, "Pencil", 50, 10).await;
        let offer = fixtures::current_offer(&db, "Giveaway", 60).await;
        let product = db.products().set_offer(&product.id, Some(&offer.id)).await.unwrap();

        let snapshot = db.products().current_price(&product).await.unwrap();
        assert_eq!(snapshot.unit_price, Money::zero());
        assert_eq!(snapshot.discount, Money::from_cents(50));
    }

    #[tokio::test]
    async fn test_get_by_ids_keeps_order_and_skips_inactive() {
        let db = fixtures::db().await;
        let a = fixtures::product(&db, "A", 100, 1).await;
        let b = fixtures::product(&db, "B", 100, 1).await;
        let c = fixtures::product(&db, "C", 100, 1).await;
        db.products().soft_delete(&b.id).await.unwrap();

        let ids = vec![c.id.clone(), b.id.clone(), a.id.clone(), "missing".to_string()];
        let found = db.products().get_by_ids(&ids).await.unwrap();

        let names: Vec<&str> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A"]);
        assert_eq!(db.products().count().await.unwrap(), 2);
    }
}
