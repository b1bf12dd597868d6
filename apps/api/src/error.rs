//! Error types for the REST API.
//!
//! Every handler returns `ApiResult<T>`. Errors render as a status code plus
//! a JSON body `{"code": "...", "message": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use libreria_core::{CoreError, ValidationError};
use libreria_db::{DbError, LoginFailure};

/// Fixed messages for refused logins and missing tokens.
pub mod messages {
    pub const CREDENTIALS_REQUIRED: &str = "Email and password are required.";
    pub const UNKNOWN_EMAIL: &str = "This email is not registered.";
    pub const WRONG_PASSWORD: &str = "The password is incorrect.";
    pub const TOKEN_MISSING: &str = "Authentication credentials were not provided.";
    pub const TOKEN_INVALID: &str = "Invalid or expired token.";
}

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Authentication failed: {0}")]
    Unauthorized(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The recommendation service answered with a non-2xx status.
    #[error("Recommendation service error: {0}")]
    Upstream(String),

    /// The recommendation service could not be reached in time.
    #[error("Recommendation service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Core(CoreError::Validation(err))
    }
}

impl ApiError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        ApiError::NotFound(format!("{entity} not found: {id}"))
    }

    pub fn forbidden() -> Self {
        ApiError::Core(CoreError::Forbidden)
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Db(err) => match err {
                DbError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                DbError::UniqueViolation { .. } => (StatusCode::BAD_REQUEST, "duplicate"),
                DbError::ForeignKeyViolation { .. } => (StatusCode::BAD_REQUEST, "invalid_reference"),
                DbError::Core(core) => core_status(core),
                DbError::InvalidCredentials(_) => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },
            ApiError::Core(core) => core_status(core),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "recommendation_error"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "recommendation_unavailable"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    fn client_message(&self) -> String {
        match self {
            ApiError::Db(DbError::InvalidCredentials(LoginFailure::UnknownEmail)) => {
                messages::UNKNOWN_EMAIL.to_string()
            }
            ApiError::Db(DbError::InvalidCredentials(LoginFailure::WrongPassword)) => {
                messages::WRONG_PASSWORD.to_string()
            }
            ApiError::Unauthorized(msg) => (*msg).to_string(),
            ApiError::Db(
                DbError::NotFound { .. }
                | DbError::UniqueViolation { .. }
                | DbError::ForeignKeyViolation { .. }
                | DbError::Core(_),
            ) => self.to_string(),
            // Don't expose database internals to clients
            ApiError::Db(_) | ApiError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

fn core_status(err: &CoreError) -> (StatusCode, &'static str) {
    match err {
        CoreError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
        CoreError::InsufficientStock { .. } => (StatusCode::BAD_REQUEST, "insufficient_stock"),
        CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        _ => (StatusCode::BAD_REQUEST, "business_rule"),
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(error = %self, code, "Request error");
        } else {
            tracing::debug!(error = %self, code, "Request rejected");
        }

        let body = ErrorBody {
            code,
            message: self.client_message(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `ApiError`.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(status(ApiError::not_found("Product", "p-1")), StatusCode::NOT_FOUND);
        assert_eq!(status(ApiError::forbidden()), StatusCode::FORBIDDEN);
        assert_eq!(
            status(ApiError::Unauthorized(messages::TOKEN_MISSING)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(ApiError::Db(DbError::duplicate("name", "Dune"))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ApiError::Core(CoreError::InsufficientStock {
                product: "Dune".to_string(),
                available: 1,
                requested: 2,
            })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(ApiError::Upstream("502".to_string())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(ApiError::Unavailable("timeout".to_string())), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_login_failure_messages() {
        let err = ApiError::Db(DbError::InvalidCredentials(LoginFailure::UnknownEmail));
        assert_eq!(err.client_message(), messages::UNKNOWN_EMAIL);

        let err = ApiError::Db(DbError::InvalidCredentials(LoginFailure::WrongPassword));
        assert_eq!(err.client_message(), messages::WRONG_PASSWORD);
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = ApiError::Db(DbError::QueryFailed("near \"SELEC\": syntax error".to_string()));
        assert_eq!(err.client_message(), "Internal server error");
        assert_eq!(status(err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
