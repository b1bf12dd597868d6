//! # Permission Repository
//!
//! Permission names such as `edit_products`. Roles reference them through
//! `role_permissions`; only active permissions are honoured at request time.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use libreria_core::validation::validate_name;
use libreria_core::Permission;

use super::{begin_write, generate_id};
use crate::error::{DbError, DbResult};

const PERMISSION_COLUMNS: &str = "id, name, description, is_active, created_at";

#[derive(Debug, Clone)]
pub struct PermissionRepository {
    pool: SqlitePool,
}

impl PermissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PermissionRepository { pool }
    }

    /// Lists active permissions ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Permission>> {
        let sql = format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE is_active = 1 ORDER BY name"
        );

        let permissions = sqlx::query_as::<_, Permission>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(permissions)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Permission>> {
        let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = ?1");

        let permission = sqlx::query_as::<_, Permission>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(permission)
    }

    pub async fn insert(&self, name: &str, description: &str) -> DbResult<Permission> {
        let name = validate_name("name", name)?;
        self.ensure_unique(&name, None).await?;

        let permission = Permission {
            id: generate_id(),
            name,
            description: description.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO permissions (id, name, description, is_active, created_at) \
             VALUES (?1, ?2, ?3, 1, ?4)",
        )
        .bind(&permission.id)
        .bind(&permission.name)
        .bind(&permission.description)
        .bind(permission.created_at)
        .execute(&self.pool)
        .await?;

        info!(id = %permission.id, name = %permission.name, "Permission created");
        Ok(permission)
    }

    /// Creates every name not already present and returns the new rows.
    ///
    /// Existing names (active or not) are skipped silently, so this is safe
    /// to call on every seed run.
    pub async fn bulk_insert(&self, names: &[String]) -> DbResult<Vec<Permission>> {
        let mut tx = begin_write(&self.pool).await?;
        let mut created = Vec::new();

        for name in names {
            let name = validate_name("name", name)?;

            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions WHERE name = ?1")
                .bind(&name)
                .fetch_one(&mut *tx)
                .await?;

            if exists > 0 || created.iter().any(|p: &Permission| p.name == name) {
                debug!(name = %name, "Permission exists, skipping");
                continue;
            }

            let permission = Permission {
                id: generate_id(),
                name,
                description: String::new(),
                is_active: true,
                created_at: Utc::now(),
            };

            sqlx::query(
                "INSERT INTO permissions (id, name, description, is_active, created_at) \
                 VALUES (?1, ?2, '', 1, ?3)",
            )
            .bind(&permission.id)
            .bind(&permission.name)
            .bind(permission.created_at)
            .execute(&mut *tx)
            .await?;

            created.push(permission);
        }

        tx.commit().await?;

        info!(
            requested = names.len(),
            created = created.len(),
            "Permissions bulk-created"
        );
        Ok(created)
    }

    pub async fn update(&self, id: &str, name: &str, description: &str) -> DbResult<Permission> {
        let name = validate_name("name", name)?;
        self.ensure_unique(&name, Some(id)).await?;

        let result = sqlx::query("UPDATE permissions SET name = ?2, description = ?3 WHERE id = ?1")
            .bind(id)
            .bind(&name)
            .bind(description.trim())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Permission", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Permission", id))
    }

    /// Deactivates a permission. Roles keep the link but stop granting it.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE permissions SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Permission", id));
        }

        info!(id = %id, "Permission deactivated");
        Ok(())
    }

    async fn ensure_unique(&self, name: &str, except_id: Option<&str>) -> DbResult<()> {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM permissions WHERE name = ?1 AND (?2 IS NULL OR id <> ?2)",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_bulk_insert_skips_existing() {
        let db = fixtures::db().await;
        db.permissions().insert("view_products", "See products").await.unwrap();

        let names = vec![
            "view_products".to_string(),
            "edit_products".to_string(),
            "edit_products".to_string(),
        ];
        let created = db.permissions().bulk_insert(&names).await.unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "edit_products");
        assert_eq!(db.permissions().list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = fixtures::db().await;
        let p = db.permissions().insert("view_reports", "").await.unwrap();

        let updated = db
            .permissions()
            .update(&p.id, "view_reports", "Sales reports")
            .await
            .unwrap();
        assert_eq!(updated.description, "Sales reports");

        db.permissions().soft_delete(&p.id).await.unwrap();
        assert!(db.permissions().list().await.unwrap().is_empty());
    }
}
