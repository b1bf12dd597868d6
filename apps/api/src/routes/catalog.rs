//! Categories, genres, authors and publishers.
//!
//! The four lookup tables share one set of handlers; [`routes`] mounts them
//! once per [`CatalogKind`]. Reads are public.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use libreria_core::permissions::{Operation, Requirement};
use libreria_core::{CatalogEntry, CatalogKind};

use crate::auth::RequireAuth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// URL segment for each catalog table.
pub const fn path_segment(kind: CatalogKind) -> &'static str {
    match kind {
        CatalogKind::Category => "categorias",
        CatalogKind::Genre => "generos",
        CatalogKind::Author => "autores",
        CatalogKind::Publisher => "editoriales",
    }
}

pub fn routes(kind: CatalogKind) -> Router<AppState> {
    let base = format!("/{}", path_segment(kind));
    let item = format!("{base}/{{id}}");

    Router::new()
        .route(
            &base,
            get(move |state: State<AppState>| list(state, kind)).post(
                move |state: State<AppState>, auth: RequireAuth, body: Json<EntryRequest>| {
                    create(state, auth, body, kind)
                },
            ),
        )
        .route(
            &item,
            get(move |state: State<AppState>, id: Path<String>| show(state, id, kind))
                .put(
                    move |state: State<AppState>,
                          auth: RequireAuth,
                          id: Path<String>,
                          body: Json<EntryRequest>| rename(state, auth, id, body, kind),
                )
                .delete(move |state: State<AppState>, auth: RequireAuth, id: Path<String>| {
                    remove(state, auth, id, kind)
                }),
        )
}

#[derive(Debug, Deserialize)]
pub struct EntryRequest {
    #[serde(alias = "nombre")]
    pub name: String,
}

fn requirement(op: Operation, kind: CatalogKind) -> Requirement {
    Requirement::new(op, kind.into())
}

async fn list(State(state): State<AppState>, kind: CatalogKind) -> ApiResult<Json<Vec<CatalogEntry>>> {
    Ok(Json(state.db().catalog(kind).list().await?))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    kind: CatalogKind,
) -> ApiResult<Json<CatalogEntry>> {
    state
        .db()
        .catalog(kind)
        .get_by_id(&id)
        .await?
        .filter(|e| e.is_active)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(kind.label(), &id))
}

async fn create(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(req): Json<EntryRequest>,
    kind: CatalogKind,
) -> ApiResult<(StatusCode, Json<CatalogEntry>)> {
    auth.require(requirement(Operation::Create, kind))?;

    let entry = state.db().catalog(kind).create(&req.name).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn rename(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
    Json(req): Json<EntryRequest>,
    kind: CatalogKind,
) -> ApiResult<Json<CatalogEntry>> {
    auth.require(requirement(Operation::Edit, kind))?;

    Ok(Json(state.db().catalog(kind).rename(&id, &req.name).await?))
}

async fn remove(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
    kind: CatalogKind,
) -> ApiResult<StatusCode> {
    auth.require(requirement(Operation::Delete, kind))?;

    state.db().catalog(kind).soft_delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
