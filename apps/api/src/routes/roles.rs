//! Roles and the permissions linked to them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use libreria_core::permissions::{Operation, Requirement, Resource};
use libreria_db::RoleWithPermissions;

use crate::auth::RequireAuth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const fn roles(op: Operation) -> Requirement {
    Requirement::new(op, Resource::Roles)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list).post(create))
        .route("/roles/{id}", get(show).put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "descripcion")]
    pub description: String,
    /// Permission ids; on update, `None` keeps the current set.
    #[serde(default, alias = "permisos")]
    pub permissions: Option<Vec<String>>,
}

/// GET /roles
pub async fn list(State(state): State<AppState>, auth: RequireAuth) -> ApiResult<Json<Vec<RoleWithPermissions>>> {
    auth.require(roles(Operation::View))?;
    Ok(Json(state.db().roles().list().await?))
}

/// POST /roles
pub async fn create(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(req): Json<RoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleWithPermissions>)> {
    auth.require(roles(Operation::Create))?;

    let role = state
        .db()
        .roles()
        .insert(&req.name, &req.description, req.permissions.as_deref().unwrap_or_default())
        .await?;

    Ok((StatusCode::CREATED, Json(role)))
}

/// GET /roles/{id}
pub async fn show(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<RoleWithPermissions>> {
    auth.require(roles(Operation::View))?;

    state
        .db()
        .roles()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Role", &id))
}

/// PUT /roles/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
    Json(req): Json<RoleRequest>,
) -> ApiResult<Json<RoleWithPermissions>> {
    auth.require(roles(Operation::Edit))?;

    let mut role = state.db().roles().update(&id, &req.name, &req.description).await?;
    if let Some(permission_ids) = &req.permissions {
        role = state.db().roles().set_permissions(&id, permission_ids).await?;
    }

    Ok(Json(role))
}

/// DELETE /roles/{id}
pub async fn remove(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    auth.require(roles(Operation::Delete))?;

    state.db().roles().soft_delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
