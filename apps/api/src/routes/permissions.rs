//! Permission records.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use libreria_core::permissions::{Operation, Requirement, Resource};
use libreria_core::Permission;

use crate::auth::RequireAuth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const fn permissions(op: Operation) -> Requirement {
    Requirement::new(op, Resource::Permissions)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/permisos", get(list).post(create))
        .route("/permisos/crear-multiples", post(create_many))
        .route("/permisos/{id}", get(show).put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "descripcion")]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    #[serde(alias = "nombres")]
    pub names: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub created: Vec<Permission>,
    pub skipped: usize,
}

/// GET /permisos
pub async fn list(State(state): State<AppState>, auth: RequireAuth) -> ApiResult<Json<Vec<Permission>>> {
    auth.require(permissions(Operation::View))?;
    Ok(Json(state.db().permissions().list().await?))
}

/// POST /permisos
pub async fn create(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(req): Json<PermissionRequest>,
) -> ApiResult<(StatusCode, Json<Permission>)> {
    auth.require(permissions(Operation::Create))?;

    let permission = state.db().permissions().insert(&req.name, &req.description).await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

/// POST /permisos/crear-multiples
///
/// Names that already exist are skipped rather than rejected.
pub async fn create_many(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(req): Json<BulkRequest>,
) -> ApiResult<(StatusCode, Json<BulkResponse>)> {
    auth.require(permissions(Operation::Create))?;

    let created = state.db().permissions().bulk_insert(&req.names).await?;
    let skipped = req.names.len().saturating_sub(created.len());

    Ok((StatusCode::CREATED, Json(BulkResponse { created, skipped })))
}

/// GET /permisos/{id}
pub async fn show(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<Permission>> {
    auth.require(permissions(Operation::View))?;

    state
        .db()
        .permissions()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Permission", &id))
}

/// PUT /permisos/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
    Json(req): Json<PermissionRequest>,
) -> ApiResult<Json<Permission>> {
    auth.require(permissions(Operation::Edit))?;

    let permission = state
        .db()
        .permissions()
        .update(&id, &req.name, &req.description)
        .await?;
    Ok(Json(permission))
}

/// DELETE /permisos/{id}
pub async fn remove(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    auth.require(permissions(Operation::Delete))?;

    state.db().permissions().soft_delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
