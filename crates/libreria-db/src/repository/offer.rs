//! # Offer Repository
//!
//! Offers are named absolute discounts with a validity window. Whether an
//! offer applies is decided by [`Offer::is_in_effect`], never by SQL, so the
//! window check lives in one place.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use libreria_core::validation::{validate_discount_cents, validate_name, validate_offer_window};
use libreria_core::Offer;

use super::generate_id;
use crate::error::{DbError, DbResult};

pub(crate) const OFFER_COLUMNS: &str =
    "id, name, description, discount_cents, starts_at, ends_at, is_active, created_at, updated_at";

/// Fields supplied when creating or replacing an offer.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOffer {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub discount_cents: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl NewOffer {
    fn validate(&self) -> DbResult<String> {
        let name = validate_name("name", &self.name)?;
        validate_discount_cents(self.discount_cents)?;
        validate_offer_window(self.starts_at, self.ends_at)?;
        Ok(name)
    }
}

#[derive(Debug, Clone)]
pub struct OfferRepository {
    pool: SqlitePool,
}

impl OfferRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OfferRepository { pool }
    }

    /// Lists active offers, newest window first.
    pub async fn list(&self) -> DbResult<Vec<Offer>> {
        let sql = format!(
            "SELECT {OFFER_COLUMNS} FROM offers WHERE is_active = 1 ORDER BY starts_at DESC, name"
        );

        let offers = sqlx::query_as::<_, Offer>(&sql).fetch_all(&self.pool).await?;
        Ok(offers)
    }

    /// Lists offers in effect at `now`.
    pub async fn list_in_effect(&self, now: DateTime<Utc>) -> DbResult<Vec<Offer>> {
        let offers = self
            .list()
            .await?
            .into_iter()
            .filter(|o| o.is_in_effect(now))
            .collect();

        Ok(offers)
    }

    /// Every offer ever created, including deactivated ones.
    ///
    /// Cart summaries need these to tell an expired offer from an unknown one.
    pub async fn list_all(&self) -> DbResult<Vec<Offer>> {
        let sql = format!("SELECT {OFFER_COLUMNS} FROM offers ORDER BY name");

        let offers = sqlx::query_as::<_, Offer>(&sql).fetch_all(&self.pool).await?;
        Ok(offers)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Offer>> {
        let sql = format!("SELECT {OFFER_COLUMNS} FROM offers WHERE id = ?1");

        let offer = sqlx::query_as::<_, Offer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(offer)
    }

    /// Creates an offer.
    ///
    /// ## Returns
    /// * `Err(DbError::Core(..))` - non-positive discount or start not before end
    /// * `Err(DbError::UniqueViolation)` - name already taken
    pub async fn insert(&self, new: &NewOffer) -> DbResult<Offer> {
        let name = new.validate()?;
        self.ensure_unique(&name, None).await?;

        let now = Utc::now();
        let offer = Offer {
            id: generate_id(),
            name,
            description: new.description.trim().to_string(),
            discount_cents: new.discount_cents,
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO offers (
                id, name, description, discount_cents, starts_at, ends_at,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8)
            "#,
        )
        .bind(&offer.id)
        .bind(&offer.name)
        .bind(&offer.description)
        .bind(offer.discount_cents)
        .bind(offer.starts_at)
        .bind(offer.ends_at)
        .bind(offer.created_at)
        .bind(offer.updated_at)
        .execute(&self.pool)
        .await?;

        info!(
            id = %offer.id,
            name = %offer.name,
            discount_cents = offer.discount_cents,
            "Offer created"
        );
        Ok(offer)
    }

    /// Replaces an offer's fields. Saved cart lines keep their snapshots.
    pub async fn update(&self, id: &str, changes: &NewOffer) -> DbResult<Offer> {
        let name = changes.validate()?;
        self.ensure_unique(&name, Some(id)).await?;

        let result = sqlx::query(
            r#"
            UPDATE offers SET
                name = ?2,
                description = ?3,
                discount_cents = ?4,
                starts_at = ?5,
                ends_at = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(changes.description.trim())
        .bind(changes.discount_cents)
        .bind(changes.starts_at)
        .bind(changes.ends_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Offer", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Offer", id))
    }

    /// Deactivates an offer. Linked products fall back to their base price.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE offers SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Offer", id));
        }

        info!(id = %id, "Offer deactivated");
        Ok(())
    }

    /// Number of active products linked to the offer.
    pub async fn product_count(&self, id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE offer_id = ?1 AND is_active = 1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn ensure_unique(&self, name: &str, except_id: Option<&str>) -> DbResult<()> {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM offers WHERE name = ?1 AND (?2 IS NULL OR id <> ?2)",
        )
        .bind(name)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;

        if taken > 0 {
            return Err(DbError::duplicate("name", name));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
