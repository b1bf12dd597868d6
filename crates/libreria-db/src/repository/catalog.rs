//! # Catalog Repository
//!
//! Categories, genres, authors and publishers share one shape (a unique
//! name plus an active flag), so a single repository serves all four
//! tables, parameterised by [`CatalogKind`].

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use libreria_core::validation::validate_name;
use libreria_core::{CatalogEntry, CatalogKind};

use super::generate_id;
use crate::error::{DbError, DbResult};

/// Repository for one catalog lookup table.
///
/// ## Usage
/// ```rust,ignore
/// let genres = db.catalog(CatalogKind::Genre);
/// let fantasy = genres.create("Fantasy").await?;
/// ```
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
    kind: CatalogKind,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool, kind: CatalogKind) -> Self {
        CatalogRepository { pool, kind }
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    /// Lists active entries ordered by name.
    pub async fn list(&self) -> DbResult<Vec<CatalogEntry>> {
        let sql = format!(
            "SELECT id, name, is_active, created_at, updated_at FROM {} \
             WHERE is_active = 1 ORDER BY name",
            self.kind.table()
        );

        let entries = sqlx::query_as::<_, CatalogEntry>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Gets an entry by ID, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CatalogEntry>> {
        let sql = format!(
            "SELECT id, name, is_active, created_at, updated_at FROM {} WHERE id = ?1",
            self.kind.table()
        );

        let entry = sqlx::query_as::<_, CatalogEntry>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Looks an entry up by name, ignoring letter case.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<CatalogEntry>> {
        let sql = format!(
            "SELECT id, name, is_active, created_at, updated_at FROM {} WHERE name = ?1",
            self.kind.table()
        );

        let entry = sqlx::query_as::<_, CatalogEntry>(&sql)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Creates an entry.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - the name is taken in any letter case,
    ///   including by a soft-deleted entry
    pub async fn create(&self, name: &str) -> DbResult<CatalogEntry> {
        let name = validate_name("name", name)?;
        self.ensure_unique(&name, None).await?;

        let now = Utc::now();
        let entry = CatalogEntry {
            id: generate_id(),
            name,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let sql = format!(
            "INSERT INTO {} (id, name, is_active, created_at, updated_at) VALUES (?1, ?2, 1, ?3, ?4)",
            self.kind.table()
        );

        sqlx::query(&sql)
            .bind(&entry.id)
            .bind(&entry.name)
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .execute(&self.pool)
            .await?;

        info!(kind = %self.kind, id = %entry.id, name = %entry.name, "Catalog entry created");
        Ok(entry)
    }

    /// Renames an entry.
    pub async fn rename(&self, id: &str, name: &str) -> DbResult<CatalogEntry> {
        let name = validate_name("name", name)?;
        self.ensure_unique(&name, Some(id)).await?;

        let sql = format!(
            "UPDATE {} SET name = ?2, updated_at = ?3 WHERE id = ?1",
            self.kind.table()
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(&name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(self.kind.label(), id));
        }

        debug!(kind = %self.kind, id = %id, "Catalog entry renamed");
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(self.kind.label(), id))
    }

    /// Soft-deletes an entry. Products keep their link to it.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let sql = format!(
            "UPDATE {} SET is_active = 0, updated_at = ?2 WHERE id = ?1",
            self.kind.table()
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(self.kind.label(), id));
        }

        info!(kind = %self.kind, id = %id, "Catalog entry deactivated");
        Ok(())
    }

    async fn ensure_unique(&self, name: &str, except_id: Option<&str>) -> DbResult<()> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE name = ?1 AND (?2 IS NULL OR id <> ?2)",
            self.kind.table()
        );

        let taken: i64 = sqlx::query_scalar(&sql)
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
