//! Login.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{messages, ApiError, ApiResult};
use crate::state::AppState;
use crate::views::UserView;

pub fn routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub user: UserView,
}

/// POST /login
///
/// Exchanges email and password for an access token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let email = req.email.as_deref().map(str::trim).unwrap_or_default();
    let password = req.password.as_deref().unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::Unauthorized(messages::CREDENTIALS_REQUIRED));
    }

    let user = state.db().users().verify_credentials(email, password).await?;

    let role = state
        .db()
        .users()
        .load_principal(&user.id)
        .await?
        .and_then(|p| p.role);

    let token = state.jwt().generate_token(&user, role.as_deref())?;

    info!(user_id = %user.id, "User logged in");
    Ok(Json(LoginResponse {
        token,
        user_id: user.id.clone(),
        user: UserView { user, role },
    }))
}
