//! Carts and cart lines.
//!
//! Every handler here needs a token. Carts and their lines are only visible
//! to the user who owns them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use libreria_core::{Cart, CartLine};

use crate::auth::RequireAuth;
use crate::error::{ApiError, ApiResult};
use crate::routes::products::priced_all;
use crate::state::AppState;
use crate::views::{CartView, LineView, OrderView, ProductView};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/carrito", get(list).post(create))
        .route("/carrito/activo", get(active).post(active))
        .route("/carrito/{id}", get(show))
        .route("/carrito/{id}/convertir-a-pedido", post(convert))
        .route("/carrito/{id}/vaciar", delete(clear))
        .route("/carrito/{id}/recomendaciones", get(recommendations))
        .route("/detalle-carrito", get(list_lines).post(add_line))
        .route(
            "/detalle-carrito/{id}",
            get(show_line).put(set_quantity).patch(set_quantity),
        )
        .route("/detalle-carrito/{id}/eliminar-producto", delete(remove_line))
        .route("/detalle-carrito/{id}/reducir-cantidad", patch(reduce_quantity))
}

/// Loads a cart the caller owns; 403 for anyone else's.
async fn owned_cart(state: &AppState, auth: &RequireAuth, id: &str) -> ApiResult<Cart> {
    let cart = state
        .db()
        .carts()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Cart", id))?;

    if cart.user_id != auth.0.user_id {
        return Err(ApiError::forbidden());
    }
    Ok(cart)
}

/// Loads an active line of a cart the caller owns.
async fn owned_line(state: &AppState, auth: &RequireAuth, id: &str) -> ApiResult<CartLine> {
    let line = state
        .db()
        .carts()
        .get_line(id)
        .await?
        .filter(|l| l.is_active)
        .ok_or_else(|| ApiError::not_found("Cart line", id))?;

    owned_cart(state, auth, &line.cart_id).await?;
    Ok(line)
}

async fn cart_view(state: &AppState, cart: Cart) -> ApiResult<CartView> {
    let lines = state.db().carts().lines(&cart.id).await?;
    let summary = state.db().carts().summary(&cart.id).await?;
    Ok(CartView::new(cart, lines, summary))
}

// =============================================================================
// Carts
// =============================================================================

/// GET /carrito
pub async fn list(State(state): State<AppState>, auth: RequireAuth) -> ApiResult<Json<Vec<Cart>>> {
    Ok(Json(state.db().carts().list_for_user(&auth.0.user_id).await?))
}

/// POST /carrito
pub async fn create(State(state): State<AppState>, auth: RequireAuth) -> ApiResult<(StatusCode, Json<Cart>)> {
    let cart = state.db().carts().create(&auth.0.user_id).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

/// GET|POST /carrito/activo
///
/// The caller's active cart, opened on first use.
pub async fn active(State(state): State<AppState>, auth: RequireAuth) -> ApiResult<Json<CartView>> {
    let cart = state.db().carts().get_or_create_active(&auth.0.user_id).await?;
    Ok(Json(cart_view(&state, cart).await?))
}

/// GET /carrito/{id}
pub async fn show(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<CartView>> {
    let cart = owned_cart(&state, &auth, &id).await?;
    Ok(Json(cart_view(&state, cart).await?))
}

/// POST /carrito/{id}/convertir-a-pedido
pub async fn convert(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<OrderView>)> {
    let cart = owned_cart(&state, &auth, &id).await?;

    let order = state.db().orders().convert_cart(&cart.id).await?;
    info!(cart_id = %cart.id, order_id = %order.order.id, "Checkout complete");

    Ok((StatusCode::CREATED, Json(OrderView::from(order))))
}

/// DELETE /carrito/{id}/vaciar
pub async fn clear(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let cart = owned_cart(&state, &auth, &id).await?;

    let removed = state.db().carts().clear(&cart.id).await?;
    Ok(Json(json!({ "cart_id": cart.id, "removed": removed })))
}

#[derive(Debug, Serialize)]
pub struct Recommendations {
    pub cart_products: Vec<String>,
    pub recommendations: Vec<ProductView>,
}

/// GET /carrito/{id}/recomendaciones
///
/// Sends the cart's product ids to the recommendation service and returns
/// the suggested products that are still for sale.
pub async fn recommendations(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<Recommendations>> {
    let cart = owned_cart(&state, &auth, &id).await?;

    let cart_products: Vec<String> = state
        .db()
        .carts()
        .lines(&cart.id)
        .await?
        .into_iter()
        .map(|l| l.product_id)
        .collect();

    if cart_products.is_empty() {
        return Ok(Json(Recommendations {
            cart_products,
            recommendations: Vec::new(),
        }));
    }

    let suggested = state.recommender().suggest(&cart_products).await?;
    let products = state.db().products().get_by_ids(&suggested).await?;

    Ok(Json(Recommendations {
        cart_products,
        recommendations: priced_all(&state, products).await?,
    }))
}

// =============================================================================
// Cart Lines
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LineQuery {
    #[serde(default, alias = "carrito")]
    pub cart_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewLine {
    /// Defaults to the caller's active cart.
    #[serde(default, alias = "carrito")]
    pub cart_id: Option<String>,
    #[serde(alias = "producto")]
    pub product_id: String,
    #[serde(default = "one", alias = "cantidad")]
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct QuantityChange {
    #[serde(default = "one", alias = "cantidad")]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

/// GET /detalle-carrito?carrito=
///
/// Active lines of the given cart, or of the caller's active cart.
pub async fn list_lines(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<LineQuery>,
) -> ApiResult<Json<Vec<LineView<CartLine>>>> {
    let cart = match query.cart_id {
        Some(id) => owned_cart(&state, &auth, &id).await?,
        None => state.db().carts().get_or_create_active(&auth.0.user_id).await?,
    };

    let lines = state.db().carts().lines(&cart.id).await?;
    Ok(Json(lines.into_iter().map(LineView::from).collect()))
}

/// POST /detalle-carrito
///
/// Adding a product already in the cart raises that line's quantity.
pub async fn add_line(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(req): Json<NewLine>,
) -> ApiResult<(StatusCode, Json<LineView<CartLine>>)> {
    let cart = match req.cart_id {
        Some(id) => owned_cart(&state, &auth, &id).await?,
        None => state.db().carts().get_or_create_active(&auth.0.user_id).await?,
    };

    let line = state
        .db()
        .carts()
        .add_product(&cart.id, &req.product_id, req.quantity)
        .await?;

    Ok((StatusCode::CREATED, Json(LineView::from(line))))
}

/// GET /detalle-carrito/{id}
pub async fn show_line(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<LineView<CartLine>>> {
    let line = owned_line(&state, &auth, &id).await?;
    Ok(Json(LineView::from(line)))
}

/// PUT|PATCH /detalle-carrito/{id}
///
/// Sets the total quantity; zero removes the line.
pub async fn set_quantity(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
    Json(req): Json<QuantityChange>,
) -> ApiResult<Json<LineView<CartLine>>> {
    owned_line(&state, &auth, &id).await?;

    let line = state.db().carts().set_quantity(&id, req.quantity).await?;
    Ok(Json(LineView::from(line)))
}

/// DELETE /detalle-carrito/{id}/eliminar-producto
pub async fn remove_line(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    owned_line(&state, &auth, &id).await?;

    state.db().carts().remove_line(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /detalle-carrito/{id}/reducir-cantidad
pub async fn reduce_quantity(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
    Json(req): Json<QuantityChange>,
) -> ApiResult<Json<LineView<CartLine>>> {
    owned_line(&state, &auth, &id).await?;

    let line = state.db().carts().reduce_quantity(&id, req.quantity).await?;
    Ok(Json(LineView::from(line)))
}
