//! JWT authentication module.
//!
//! Issues access tokens at login and turns a `Bearer` header back into the
//! caller's [`Principal`] on every authenticated request.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use libreria_core::permissions::{authorize, Principal, Requirement};
use libreria_core::User;

use crate::error::{messages, ApiError, ApiResult};
use crate::state::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    pub email: String,

    /// Role name at the time the token was issued
    pub role: Option<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// JWT token manager.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        }
    }

    /// Generate an access token for `user`.
    pub fn generate_token(&self, user: &User, role: Option<&str>) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: role.map(String::from),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> ApiResult<Claims> {
        let token_data: TokenData<Claims> = decode(token, &self.decoding, &Validation::default())
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                ApiError::Unauthorized(messages::TOKEN_INVALID)
            })?;

        Ok(token_data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extractor that requires a valid access token.
///
/// The principal is reloaded from the database on every request, so a
/// deactivated account or a changed role takes effect immediately.
///
/// ```rust,ignore
/// async fn my_orders(
///     State(state): State<AppState>,
///     RequireAuth(principal): RequireAuth,
/// ) -> ApiResult<Json<Vec<Order>>> {
///     let orders = state.db().orders().list(Some(&principal.user_id)).await?;
///     Ok(Json(orders))
/// }
/// ```
pub struct RequireAuth(pub Principal);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized(messages::TOKEN_MISSING))?;

        let token = extract_bearer_token(header).ok_or(ApiError::Unauthorized(messages::TOKEN_INVALID))?;
        let claims = state.jwt().validate_token(token)?;

        let principal = state
            .db()
            .users()
            .load_principal(&claims.sub)
            .await?
            .ok_or(ApiError::Unauthorized(messages::TOKEN_INVALID))?;

        Ok(RequireAuth(principal))
    }
}

impl RequireAuth {
    /// Fails with 403 unless the principal's role grants `required`.
    pub fn require(&self, required: Requirement) -> ApiResult<()> {
        authorize(&self.0, Some(required))?;
        Ok(())
    }

    /// Fails with 403 unless the caller owns the record or is an admin.
    pub fn require_owner(&self, owner_id: &str) -> ApiResult<()> {
        if self.0.can_access_owned_by(owner_id) {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: "user-001".to_string(),
            email: "ana@example.com".to_string(),
            full_name: "Ana".to_string(),
            phone: None,
            address: None,
            role_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret", 3600);

        let token = manager.generate_token(&user(), Some("customer")).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "user-001");
        assert_eq!(claims.email, "ana@example.com");
        assert_eq!(claims.role.as_deref(), Some("customer"));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret() {
        let token = JwtManager::new("one", 3600).generate_token(&user(), None).unwrap();

        let result = JwtManager::new("two", 3600).validate_token(&token);
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_expired_token() {
        // Past the default 60 s leeway
        let token = JwtManager::new("secret", -120).generate_token(&user(), None).unwrap();

        assert!(JwtManager::new("secret", 3600).validate_token(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
