//! # User Repository
//!
//! Accounts, credentials and the permission set behind each request.
//!
//! ## Login Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  verify_credentials(email, password)                                    │
//! │       │                                                                 │
//! │       ├── no active user with that email ──► LoginFailure::UnknownEmail │
//! │       │                                                                 │
//! │       ├── argon2 verify fails ───────────► LoginFailure::WrongPassword  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  User (no hash) ──► API issues a JWT                                    │
//! │                                                                         │
//! │  Every authenticated request:                                           │
//! │  load_principal(sub) ──► role name + ACTIVE permission names            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Password hashes never leave this module: [`User`] has no hash field.

use std::collections::HashSet;

use chrono::Utc;
use serde::Deserialize;
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info, warn};

use libreria_core::permissions::Principal;
use libreria_core::validation::{validate_email, validate_name, validate_password};
use libreria_core::User;

use super::generate_id;
use crate::error::{DbError, DbResult, LoginFailure};

const USER_COLUMNS: &str =
    "id, email, full_name, phone, address, role_id, is_active, created_at, updated_at";

/// Fields supplied when registering a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub role_id: Option<String>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserChanges {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role_id: Option<String>,
}

#[derive(Debug, FromRow)]
struct UserRow {
    #[sqlx(flatten)]
    user: User,
    password_hash: String,
}

#[derive(Debug, FromRow)]
struct PrincipalRow {
    id: String,
    email: String,
    role_id: Option<String>,
    role_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Lists active users ordered by name.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE is_active = 1 ORDER BY full_name");

        let users = sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?;
        Ok(users)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Looks a user up by email, ignoring letter case.
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Registers a user with an argon2-hashed password.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - email or full name already registered
    pub async fn insert(&self, new: &NewUser) -> DbResult<User> {
        let email = validate_email(&new.email)?;
        let full_name = validate_name("full_name", &new.full_name)?;
        validate_password(&new.password)?;

        self.ensure_unique("email", &email, None).await?;
        self.ensure_unique("full_name", &full_name, None).await?;

        let password_hash = hash_password(&new.password)?;
        let now = Utc::now();

        let user = User {
            id: generate_id(),
            email,
            full_name,
            phone: new.phone.clone(),
            address: new.address.clone(),
            role_id: new.role_id.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, full_name, phone, address, role_id,
                password_hash, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.role_id)
        .bind(&password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %user.id, email = %user.email, "User registered");
        Ok(user)
    }

    /// Applies a partial update.
    pub async fn update(&self, id: &str, changes: &UserChanges) -> DbResult<User> {
        let email = changes.email.as_deref().map(validate_email).transpose()?;
        let full_name = changes
            .full_name
            .as_deref()
            .map(|n| validate_name("full_name", n))
            .transpose()?;

        if let Some(email) = &email {
            self.ensure_unique("email", email, Some(id)).await?;
        }
        if let Some(full_name) = &full_name {
            self.ensure_unique("full_name", full_name, Some(id)).await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = COALESCE(?2, email),
                full_name = COALESCE(?3, full_name),
                phone = COALESCE(?4, phone),
                address = COALESCE(?5, address),
                role_id = COALESCE(?6, role_id),
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(full_name)
        .bind(&changes.phone)
        .bind(&changes.address)
        .bind(&changes.role_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        debug!(id = %id, "User updated");
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    pub async fn change_password(&self, id: &str, password: &str) -> DbResult<()> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let result = sqlx::query("UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        info!(id = %id, "Password changed");
        Ok(())
    }

    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        info!(id = %id, "User deactivated");
        Ok(())
    }

    /// Checks an email/password pair against active accounts.
    ///
    /// ## Returns
    /// * `Err(DbError::InvalidCredentials(UnknownEmail))` - no active account
    /// * `Err(DbError::InvalidCredentials(WrongPassword))` - hash mismatch
    pub async fn verify_credentials(&self, email: &str, password: &str) -> DbResult<User> {
        let sql = format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1 AND is_active = 1"
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            debug!(email = %email, "Login for unknown email");
            return Err(DbError::InvalidCredentials(LoginFailure::UnknownEmail));
        };

        if !verify_password(password, &row.password_hash) {
            warn!(user_id = %row.user.id, "Login with wrong password");
            return Err(DbError::InvalidCredentials(LoginFailure::WrongPassword));
        }

        Ok(row.user)
    }

    /// Loads the caller behind an authenticated request.
    ///
    /// `None` when the user is unknown or deactivated. A deactivated role
    /// counts as no role; deactivated permissions are left out.
    pub async fn load_principal(&self, user_id: &str) -> DbResult<Option<Principal>> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT u.id, u.email, r.id AS role_id, r.name AS role_name
            FROM users u
            LEFT JOIN roles r ON r.id = u.role_id AND r.is_active = 1
            WHERE u.id = ?1 AND u.is_active = 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let permissions: Vec<String> = match &row.role_id {
            Some(role_id) => {
                sqlx::query_scalar(
                    r#"
                    SELECT p.name
                    FROM role_permissions rp
                    JOIN permissions p ON p.id = rp.permission_id
                    WHERE rp.role_id = ?1 AND p.is_active = 1
                    "#,
                )
                .bind(role_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => Vec::new(),
        };

        Ok(Some(Principal {
            user_id: row.id,
            email: row.email,
            role: row.role_name,
            permissions: permissions.into_iter().collect::<HashSet<_>>(),
        }))
    }

    async fn ensure_unique(&self, column: &str, value: &str, except_id: Option<&str>) -> DbResult<()> {
        // column is always a literal from this module
        let sql = format!("SELECT COUNT(*) FROM users WHERE {column} = ?1 AND (?2 IS NULL OR id <> ?2)");

        let taken: i64 = sqlx::query_scalar(&sql)
            .bind(value)
            .bind(except_id)
            .fetch_one(&self.pool)
            .await?;

        if taken > 0 {
            return Err(DbError::duplicate(column, value));
        }
        Ok(())
    }
}

// =============================================================================
// Password hashing
// =============================================================================

/// Hashes a password for storage (argon2id, random salt).
pub fn hash_password(password: &str) -> DbResult<String> {
    use argon2::{
        password_hash::{rand_core::OsRng, SaltString},
        Argon2, PasswordHasher,
    };

    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

// =============================================================================
// Unit Tests
// =============================================================================
