//! # Role Repository
//!
//! Roles group permissions. A user has at most one role; the built-in
//! `admin` and `customer` roles are created by the seed binary or on first
//! self-registration.

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use libreria_core::validation::validate_name;
use libreria_core::{Permission, Role};

use super::{begin_write, generate_id};
use crate::error::{DbError, DbResult};

const ROLE_COLUMNS: &str = "id, name, description, is_active, created_at";

/// A role together with the permissions linked to it.
#[derive(Debug, Clone, Serialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone)]
pub struct RoleRepository {
    pool: SqlitePool,
}

impl RoleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RoleRepository { pool }
    }

    /// Lists active roles with their permissions.
    pub async fn list(&self) -> DbResult<Vec<RoleWithPermissions>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE is_active = 1 ORDER BY name");

        let mut conn = self.pool.acquire().await?;
        let roles = sqlx::query_as::<_, Role>(&sql).fetch_all(&mut *conn).await?;

        let mut result = Vec::with_capacity(roles.len());
        for role in roles {
            let permissions = role_permissions(&mut conn, &role.id).await?;
            result.push(RoleWithPermissions { role, permissions });
        }

        Ok(result)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<RoleWithPermissions>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = ?1");

        let mut conn = self.pool.acquire().await?;
        let Some(role) = sqlx::query_as::<_, Role>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };

        let permissions = role_permissions(&mut conn, &role.id).await?;
        Ok(Some(RoleWithPermissions { role, permissions }))
    }

    /// Looks a role up by name, ignoring letter case.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = ?1");

        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(role)
    }

    /// Creates a role linked to `permission_ids`.
    pub async fn insert(
        &self,
        name: &str,
        description: &str,
        permission_ids: &[String],
    ) -> DbResult<RoleWithPermissions> {
        let name = validate_name("name", name)?;
        self.ensure_unique(&name, None).await?;

        let role = Role {
            id: generate_id(),
            name,
            description: description.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        let mut tx = begin_write(&self.pool).await?;

        sqlx::query(
            "INSERT INTO roles (id, name, description, is_active, created_at) VALUES (?1, ?2, ?3, 1, ?4)",
        )
        .bind(&role.id)
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.created_at)
        .execute(&mut *tx)
        .await?;

        replace_permissions(&mut tx, &role.id, permission_ids).await?;
        let permissions = role_permissions(&mut tx, &role.id).await?;

        tx.commit().await?;

        info!(id = %role.id, name = %role.name, permissions = permissions.len(), "Role created");
        Ok(RoleWithPermissions { role, permissions })
    }

    /// Renames a role and updates its description.
    pub async fn update(&self, id: &str, name: &str, description: &str) -> DbResult<RoleWithPermissions> {
        let name = validate_name("name", name)?;
        self.ensure_unique(&name, Some(id)).await?;

        let result = sqlx::query("UPDATE roles SET name = ?2, description = ?3 WHERE id = ?1")
            .bind(id)
            .bind(&name)
            .bind(description.trim())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Role", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Role", id))
    }

    /// Replaces the role's permission set.
    ///
    /// ## Returns
    /// * `Err(DbError::ForeignKeyViolation)` - an id names no permission
    pub async fn set_permissions(&self, id: &str, permission_ids: &[String]) -> DbResult<RoleWithPermissions> {
        let mut tx = begin_write(&self.pool).await?;

        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(DbError::not_found("Role", id));
        }

        replace_permissions(&mut tx, id, permission_ids).await?;
        tx.commit().await?;

        info!(id = %id, count = permission_ids.len(), "Role permissions replaced");
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Role", id))
    }

    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE roles SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Role", id));
        }

        info!(id = %id, "Role deactivated");
        Ok(())
    }

    /// Returns the role called `name`, creating it without permissions if
    /// it does not exist yet.
    pub async fn get_or_create(&self, name: &str, description: &str) -> DbResult<Role> {
        if let Some(role) = self.get_by_name(name).await? {
            return Ok(role);
        }

        Ok(self.insert(name, description, &[]).await?.role)
    }

    async fn ensure_unique(&self, name: &str, except_id: Option<&str>) -> DbResult<()> {
        let taken: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE name = ?1 AND (?2 IS NULL OR id <> ?2)")
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

async fn role_permissions(conn: &mut SqliteConnection, role_id: &str) -> DbResult<Vec<Permission>> {
    let permissions = sqlx::query_as::<_, Permission>(
        r#"
        SELECT p.id, p.name, p.description, p.is_active, p.created_at
        FROM role_permissions rp
        JOIN permissions p ON p.id = rp.permission_id
        WHERE rp.role_id = ?1
        ORDER BY p.name
        "#,
    )
    .bind(role_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(permissions)
}

async fn replace_permissions(
    conn: &mut SqliteConnection,
    role_id: &str,
    permission_ids: &[String],
) -> DbResult<()> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = ?1")
        .bind(role_id)
        .execute(&mut *conn)
        .await?;

    for permission_id in permission_ids {
        sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?1, ?2)")
            .bind(role_id)
            .bind(permission_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}
