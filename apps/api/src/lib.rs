//! # Libreria API
//!
//! REST server for the bookstore: catalog, carts, checkout, orders and
//! sales reports.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Libreria API                                   │
//! │                                                                         │
//! │  client ──► axum (/Libreria/...) ──► routes ──► libreria-db ──► SQLite  │
//! │                     │                  │                                │
//! │               RequireAuth (JWT)        └──► RecommendationClient (HTTP) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `API_HOST` / `API_PORT` - Listen address (default: 0.0.0.0:8000)
//! - `DATABASE_PATH` - SQLite file (default: ./libreria.db)
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `JWT_SECRET` - Secret for JWT signing
//! - `JWT_LIFETIME_SECS` - Token lifetime (default: 86400)
//! - `RECOMMENDATION_SERVICE_URL` - Recommendation endpoint
//! - `RECOMMENDATION_TIMEOUT_SECS` - Recommendation timeout (default: 5)
//! - `CORS_ALLOWED_ORIGIN` - Allowed origin; any origin when unset

pub mod auth;
pub mod config;
pub mod csv_export;
pub mod error;
pub mod recommendations;
pub mod routes;
pub mod state;
pub mod views;

use axum::http::{header, HeaderValue};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// Re-exports
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Prefix every API route is mounted under.
pub const API_PREFIX: &str = "/Libreria";

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.config().cors_allowed_origin.as_deref());

    Router::new()
        .nest(API_PREFIX, routes::api_routes())
        .merge(routes::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CSV downloads need `Content-Disposition` readable from browsers.
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION]);

    match origin.map(str::parse::<HeaderValue>) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(_)) => {
            tracing::warn!("Ignoring unparseable CORS origin, allowing any");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}
