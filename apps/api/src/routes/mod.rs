//! HTTP route handlers.
//!
//! # Route Structure
//!
//! Everything except `/health` is mounted under `/Libreria`.
//!
//! ```text
//! # Auth & access control
//! POST /login                                  - Token for email + password
//! GET|POST /usuarios, GET|PUT|DELETE /usuarios/{id}
//! POST /usuarios/crear-cliente                 - Self-registration (public)
//! POST /usuarios/{id}/cambiar-password
//! GET|POST /roles, GET|PUT|DELETE /roles/{id}
//! GET|POST /permisos, GET|PUT|DELETE /permisos/{id}
//! POST /permisos/crear-multiples
//!
//! # Catalog (reads public)
//! GET|POST /categorias | /generos | /autores | /editoriales (+ /{id})
//! GET|POST /productos, GET|PUT|DELETE /productos/{id}
//! POST /productos/{id}/aplicar-oferta/{oferta_id}
//! POST /productos/{id}/quitar-oferta
//! GET|POST /ofertas, GET /ofertas/vigentes, GET|PUT|DELETE /ofertas/{id}
//!
//! # Shopping (authenticated)
//! GET|POST /carrito, GET /carrito/{id}, GET|POST /carrito/activo
//! POST /carrito/{id}/convertir-a-pedido
//! DELETE /carrito/{id}/vaciar
//! GET /carrito/{id}/recomendaciones
//! GET|POST /detalle-carrito, GET|PUT|PATCH /detalle-carrito/{id}
//! DELETE /detalle-carrito/{id}/eliminar-producto
//! PATCH /detalle-carrito/{id}/reducir-cantidad
//! GET|POST /pedidos, GET /pedidos/{id}, GET /pedidos/mis-pedidos
//! POST /pedidos/{id}/calificar, POST /pedidos/{id}/calcular-total
//! GET|POST /detalles
//!
//! # Reports (view_reports)
//! GET /reportes/...                            - JSON reports and CSV exports
//! GET /pedidos/combinaciones-ml, GET /ml-csv   - Recommendation training set
//! ```

pub mod auth;
pub mod carts;
pub mod catalog;
pub mod offers;
pub mod orders;
pub mod permissions;
pub mod products;
pub mod reports;
pub mod roles;
pub mod users;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};

use libreria_core::CatalogKind;

use crate::state::AppState;

/// All `/Libreria` routes.
pub fn api_routes() -> Router<AppState> {
    let mut router = Router::new()
        .merge(auth::routes())
        .merge(users::routes())
        .merge(roles::routes())
        .merge(permissions::routes())
        .merge(products::routes())
        .merge(offers::routes())
        .merge(carts::routes())
        .merge(orders::routes())
        .merge(reports::routes());

    for kind in CatalogKind::ALL {
        router = router.merge(catalog::routes(kind));
    }

    router
}

/// Health check; reports whether the database answers.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if state.db().health_check().await {
        (StatusCode::OK, Json(json!({ "status": "ok", "database": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "database": "unreachable" })),
        )
    }
}

/// Route for `/health`, kept outside the `/Libreria` prefix.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
