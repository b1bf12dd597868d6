//! User accounts.
//!
//! Staff manage accounts through the `*_users` permissions. Anyone can
//! register as a customer, and every user may read and edit their own
//! profile (but not their own role).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use libreria_core::permissions::{Operation, Requirement, Resource, CUSTOMER_ROLE};
use libreria_core::User;
use libreria_db::{NewUser, UserChanges};

use crate::auth::RequireAuth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::views::UserView;

const fn users(op: Operation) -> Requirement {
    Requirement::new(op, Resource::Users)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/usuarios", get(list).post(create))
        .route("/usuarios/crear-cliente", post(register_customer))
        .route("/usuarios/{id}", get(show).put(update).delete(remove))
        .route("/usuarios/{id}/cambiar-password", post(change_password))
}

async fn user_view(state: &AppState, user: User) -> ApiResult<UserView> {
    let role = match &user.role_id {
        Some(role_id) => state.db().roles().get_by_id(role_id).await?.map(|r| r.role.name),
        None => None,
    };
    Ok(UserView { user, role })
}

/// GET /usuarios
pub async fn list(State(state): State<AppState>, auth: RequireAuth) -> ApiResult<Json<Vec<UserView>>> {
    auth.require(users(Operation::View))?;

    let mut views = Vec::new();
    for user in state.db().users().list().await? {
        views.push(user_view(&state, user).await?);
    }
    Ok(Json(views))
}

/// POST /usuarios
pub async fn create(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(new): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    auth.require(users(Operation::Create))?;

    let user = state.db().users().insert(&new).await?;
    Ok((StatusCode::CREATED, Json(user_view(&state, user).await?)))
}

/// POST /usuarios/crear-cliente
///
/// Public self-registration. Any role in the body is ignored: the account
/// always gets the customer role.
pub async fn register_customer(
    State(state): State<AppState>,
    Json(mut new): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    let role = state
        .db()
        .roles()
        .get_or_create(CUSTOMER_ROLE, "Registered shopper")
        .await?;
    new.role_id = Some(role.id);

    let user = state.db().users().insert(&new).await?;
    info!(user_id = %user.id, "Customer registered");

    Ok((
        StatusCode::CREATED,
        Json(UserView {
            user,
            role: Some(role.name),
        }),
    ))
}

/// GET /usuarios/{id}
pub async fn show(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<UserView>> {
    if auth.0.user_id != id {
        auth.require(users(Operation::View))?;
    }

    let user = state
        .db()
        .users()
        .get_by_id(&id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::not_found("User", &id))?;

    Ok(Json(user_view(&state, user).await?))
}

/// PUT /usuarios/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
    Json(changes): Json<UserChanges>,
) -> ApiResult<Json<UserView>> {
    let is_self = auth.0.user_id == id;
    if !is_self || changes.role_id.is_some() {
        auth.require(users(Operation::Edit))?;
    }

    let user = state.db().users().update(&id, &changes).await?;
    Ok(Json(user_view(&state, user).await?))
}

/// DELETE /usuarios/{id}
pub async fn remove(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    auth.require(users(Operation::Delete))?;

    state.db().users().soft_delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ChangePassword {
    #[serde(alias = "nueva_password")]
    pub password: String,
}

/// POST /usuarios/{id}/cambiar-password
pub async fn change_password(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
    Json(body): Json<ChangePassword>,
) -> ApiResult<StatusCode> {
    if auth.0.user_id != id {
        auth.require(users(Operation::Edit))?;
    }

    state.db().users().change_password(&id, &body.password).await?;
    Ok(StatusCode::NO_CONTENT)
}
