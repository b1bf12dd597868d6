//! Products. Reads are public and include the current offer-adjusted price.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use libreria_core::permissions::{Operation, Requirement, Resource};
use libreria_core::Product;
use libreria_db::{NewProduct, ProductFilter};

use crate::auth::RequireAuth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::views::ProductView;

const fn products(op: Operation) -> Requirement {
    Requirement::new(op, Resource::Products)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/productos", get(list).post(create))
        .route("/productos/{id}", get(show).put(update).delete(remove))
        .route("/productos/{id}/aplicar-oferta/{oferta_id}", post(apply_offer))
        .route("/productos/{id}/quitar-oferta", post(clear_offer))
}

pub(crate) async fn priced(state: &AppState, product: Product) -> ApiResult<ProductView> {
    let price = state.db().products().current_price(&product).await?;
    Ok(ProductView::new(product, price))
}

pub(crate) async fn priced_all(state: &AppState, products: Vec<Product>) -> ApiResult<Vec<ProductView>> {
    let mut views = Vec::with_capacity(products.len());
    for product in products {
        views.push(priced(state, product).await?);
    }
    Ok(views)
}

/// GET /productos?categoria=&genero=&autor=&editorial=&buscar=
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> ApiResult<Json<Vec<ProductView>>> {
    let products = state.db().products().list(&filter).await?;
    Ok(Json(priced_all(&state, products).await?))
}

/// POST /productos
pub async fn create(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(new): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<ProductView>)> {
    auth.require(products(Operation::Create))?;

    let product = state.db().products().insert(&new).await?;
    Ok((StatusCode::CREATED, Json(priced(&state, product).await?)))
}

/// GET /productos/{id}
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ProductView>> {
    let product = state
        .db()
        .products()
        .get_by_id(&id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::not_found("Product", &id))?;

    Ok(Json(priced(&state, product).await?))
}

/// PUT /productos/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
    Json(changes): Json<NewProduct>,
) -> ApiResult<Json<ProductView>> {
    auth.require(products(Operation::Edit))?;

    let product = state.db().products().update(&id, &changes).await?;
    Ok(Json(priced(&state, product).await?))
}

/// DELETE /productos/{id}
pub async fn remove(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    auth.require(products(Operation::Delete))?;

    state.db().products().soft_delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /productos/{id}/aplicar-oferta/{oferta_id}
pub async fn apply_offer(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path((id, offer_id)): Path<(String, String)>,
) -> ApiResult<Json<ProductView>> {
    auth.require(products(Operation::Edit))?;

    let product = state.db().products().set_offer(&id, Some(&offer_id)).await?;
    Ok(Json(priced(&state, product).await?))
}

/// POST /productos/{id}/quitar-oferta
pub async fn clear_offer(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<ProductView>> {
    auth.require(products(Operation::Edit))?;

    let product = state.db().products().set_offer(&id, None).await?;
    Ok(Json(priced(&state, product).await?))
}
