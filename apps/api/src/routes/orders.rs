//! Orders, order lines and the recommendation training set.
//!
//! Customers see their own orders; the admin role sees everyone's.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use libreria_core::permissions::{Operation, Requirement, Resource};
use libreria_core::reports::purchase_combinations;
use libreria_core::{Order, OrderLine};
use libreria_db::OrderWithLines;

use crate::auth::RequireAuth;
use crate::csv_export;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::views::{LineView, OrderView};

const VIEW_REPORTS: Requirement = Requirement::new(Operation::View, Resource::Reports);

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pedidos", get(list).post(create))
        .route("/pedidos/mis-pedidos", get(mine))
        .route("/pedidos/combinaciones-ml", get(combinations))
        .route("/pedidos/{id}", get(show))
        .route("/pedidos/{id}/calificar", post(rate))
        .route("/pedidos/{id}/calcular-total", post(recalculate))
        .route("/detalles", get(list_lines).post(add_line))
        .route("/ml-csv", get(combinations_csv))
}

/// Loads an order the caller owns (or any order, for admins).
async fn visible_order(state: &AppState, auth: &RequireAuth, id: &str) -> ApiResult<OrderWithLines> {
    let order = state
        .db()
        .orders()
        .get_with_lines(id)
        .await?
        .filter(|o| o.order.is_active)
        .ok_or_else(|| ApiError::not_found("Order", id))?;

    auth.require_owner(&order.order.user_id)?;
    Ok(order)
}

/// GET /pedidos
pub async fn list(State(state): State<AppState>, auth: RequireAuth) -> ApiResult<Json<Vec<Order>>> {
    let owner = (!auth.0.is_admin()).then_some(auth.0.user_id.as_str());
    Ok(Json(state.db().orders().list(owner).await?))
}

/// GET /pedidos/mis-pedidos
pub async fn mine(State(state): State<AppState>, auth: RequireAuth) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.db().orders().list(Some(&auth.0.user_id)).await?))
}

#[derive(Debug, Deserialize)]
pub struct OrderItem {
    #[serde(alias = "producto")]
    pub product_id: String,
    #[serde(alias = "cantidad")]
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct NewOrder {
    #[serde(alias = "productos")]
    pub items: Vec<OrderItem>,
}

/// POST /pedidos
///
/// Places an order for the caller without going through a cart. Prices are
/// resolved at this moment.
pub async fn create(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(req): Json<NewOrder>,
) -> ApiResult<(StatusCode, Json<OrderView>)> {
    let items: Vec<(String, i64)> = req
        .items
        .into_iter()
        .map(|i| (i.product_id, i.quantity))
        .collect();

    let order = state.db().orders().create_order(&auth.0.user_id, &items).await?;
    Ok((StatusCode::CREATED, Json(OrderView::from(order))))
}

/// GET /pedidos/{id}
pub async fn show(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderView>> {
    let order = visible_order(&state, &auth, &id).await?;
    Ok(Json(OrderView::from(order)))
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    #[serde(alias = "calificacion")]
    pub rating: i64,
}

/// POST /pedidos/{id}/calificar
pub async fn rate(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
    Json(req): Json<RatingRequest>,
) -> ApiResult<Json<Order>> {
    visible_order(&state, &auth, &id).await?;

    Ok(Json(state.db().orders().rate(&id, req.rating).await?))
}

/// POST /pedidos/{id}/calcular-total
pub async fn recalculate(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderView>> {
    visible_order(&state, &auth, &id).await?;

    let order = state.db().orders().recalculate(&id).await?;
    Ok(Json(OrderView::from(order)))
}

// =============================================================================
// Order Lines
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LinesQuery {
    #[serde(alias = "pedido")]
    pub order_id: Option<String>,
}

/// GET /detalles?pedido=
pub async fn list_lines(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<LinesQuery>,
) -> ApiResult<Json<Vec<LineView<OrderLine>>>> {
    let order_id = query
        .order_id
        .ok_or_else(|| ApiError::BadRequest("query parameter 'pedido' is required".to_string()))?;

    let order = visible_order(&state, &auth, &order_id).await?;
    Ok(Json(order.lines.into_iter().map(LineView::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct NewOrderLine {
    #[serde(alias = "pedido")]
    pub order_id: String,
    #[serde(alias = "producto")]
    pub product_id: String,
    #[serde(alias = "cantidad")]
    pub quantity: i64,
}

/// POST /detalles
///
/// Adds a product to an existing order; stock is taken and the discount tier
/// recomputed.
pub async fn add_line(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(req): Json<NewOrderLine>,
) -> ApiResult<(StatusCode, Json<OrderView>)> {
    visible_order(&state, &auth, &req.order_id).await?;

    let order = state
        .db()
        .orders()
        .add_line(&req.order_id, &req.product_id, req.quantity)
        .await?;

    Ok((StatusCode::CREATED, Json(OrderView::from(order))))
}

// =============================================================================
// Purchase Combinations
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct FormatQuery {
    #[serde(default)]
    pub format: Option<String>,
}

/// GET /pedidos/combinaciones-ml?format=json|csv
pub async fn combinations(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<FormatQuery>,
) -> ApiResult<Response> {
    auth.require(VIEW_REPORTS)?;

    let orders = state.db().orders().order_products().await?;
    let rows = purchase_combinations(orders.iter().map(|(id, products)| (id.as_str(), products.as_slice())));

    match query.format.as_deref().map(str::to_lowercase).as_deref() {
        None | Some("json") => Ok(Json(rows).into_response()),
        Some("csv") => Ok(csv_export::attachment("ml_combinations.csv", csv_export::combinations(&rows)?)),
        Some(other) => Err(ApiError::BadRequest(format!(
            "format must be 'json' or 'csv', got '{other}'"
        ))),
    }
}

/// GET /ml-csv
pub async fn combinations_csv(State(state): State<AppState>, auth: RequireAuth) -> ApiResult<Response> {
    auth.require(VIEW_REPORTS)?;

    let orders = state.db().orders().order_products().await?;
    let rows = purchase_combinations(orders.iter().map(|(id, products)| (id.as_str(), products.as_slice())));

    Ok(csv_export::attachment("ml_combinations.csv", csv_export::combinations(&rows)?))
}
