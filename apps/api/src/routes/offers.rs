//! Promotional offers. Reads are public.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use libreria_core::permissions::{Operation, Requirement, Resource};
use libreria_core::Offer;
use libreria_db::NewOffer;

use crate::auth::RequireAuth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::views::OfferView;

const fn offers(op: Operation) -> Requirement {
    Requirement::new(op, Resource::Offers)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ofertas", get(list).post(create))
        .route("/ofertas/vigentes", get(in_effect))
        .route("/ofertas/{id}", get(show).put(update).delete(remove))
}

async fn view(state: &AppState, offer: Offer) -> ApiResult<OfferView> {
    let product_count = state.db().offers().product_count(&offer.id).await?;
    Ok(OfferView {
        in_effect: offer.is_in_effect(Utc::now()),
        product_count,
        offer,
    })
}

/// GET /ofertas
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Offer>>> {
    Ok(Json(state.db().offers().list().await?))
}

/// GET /ofertas/vigentes
pub async fn in_effect(State(state): State<AppState>) -> ApiResult<Json<Vec<Offer>>> {
    Ok(Json(state.db().offers().list_in_effect(Utc::now()).await?))
}

/// POST /ofertas
pub async fn create(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(new): Json<NewOffer>,
) -> ApiResult<(StatusCode, Json<OfferView>)> {
    auth.require(offers(Operation::Create))?;

    let offer = state.db().offers().insert(&new).await?;
    Ok((StatusCode::CREATED, Json(view(&state, offer).await?)))
}

/// GET /ofertas/{id}
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<OfferView>> {
    let offer = state
        .db()
        .offers()
        .get_by_id(&id)
        .await?
        .filter(|o| o.is_active)
        .ok_or_else(|| ApiError::not_found("Offer", &id))?;

    Ok(Json(view(&state, offer).await?))
}

/// PUT /ofertas/{id}
///
/// Changing an offer never touches orders already placed; their lines keep
/// the snapshot taken at checkout.
pub async fn update(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
    Json(changes): Json<NewOffer>,
) -> ApiResult<Json<OfferView>> {
    auth.require(offers(Operation::Edit))?;

    let offer = state.db().offers().update(&id, &changes).await?;
    Ok(Json(view(&state, offer).await?))
}

/// DELETE /ofertas/{id}
pub async fn remove(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    auth.require(offers(Operation::Delete))?;

    state.db().offers().soft_delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
