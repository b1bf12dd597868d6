//! End-to-end tests against the full router with an in-memory database.

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use libreria_api::{build_router, ApiConfig, AppState};
use libreria_core::permissions::{all_permission_names, ADMIN_ROLE, CUSTOMER_ROLE};
use libreria_core::Product;
use libreria_db::{Database, DbConfig, NewProduct, NewUser};

const ADMIN_EMAIL: &str = "admin@libreria.local";
const ADMIN_PASSWORD: &str = "admin-pass";

/// Nothing listens on the discard port.
const UNREACHABLE_RECOMMENDER: &str = "http://127.0.0.1:9/recommend";

struct TestApp {
    router: Router,
    db: Database,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }
}

async fn setup_with(recommendation_url: &str) -> TestApp {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    db.permissions().bulk_insert(&all_permission_names()).await.unwrap();
    let ids: Vec<String> = db
        .permissions()
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();

    let admin = db.roles().get_or_create(ADMIN_ROLE, "Full access").await.unwrap();
    db.roles().set_permissions(&admin.id, &ids).await.unwrap();
    db.roles().get_or_create(CUSTOMER_ROLE, "Registered shopper").await.unwrap();

    db.users()
        .insert(&NewUser {
            email: ADMIN_EMAIL.to_string(),
            full_name: "Administrator".to_string(),
            password: ADMIN_PASSWORD.to_string(),
            phone: None,
            address: None,
            role_id: Some(admin.id),
        })
        .await
        .unwrap();

    let config = ApiConfig {
        recommendation_url: recommendation_url.to_string(),
        recommendation_timeout_secs: 2,
        ..ApiConfig::default()
    };
    let state = AppState::new(config, db.clone()).unwrap();

    TestApp {
        router: build_router(state),
        db,
    }
}

async fn setup() -> TestApp {
    setup_with(UNREACHABLE_RECOMMENDER).await
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();

        Reply { status, headers, body }
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let reply = self
            .send(
                Method::POST,
                "/Libreria/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
        reply.json()["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Registers a customer through the public endpoint and logs them in.
    async fn customer_token(&self, email: &str) -> String {
        let reply = self
            .send(
                Method::POST,
                "/Libreria/usuarios/crear-cliente",
                None,
                Some(json!({ "email": email, "full_name": "Lucía Pérez", "password": "lectora" })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
        assert_eq!(reply.json()["role"], CUSTOMER_ROLE);

        self.login(email, "lectora").await
    }

    async fn product(&self, name: &str, price_cents: i64, stock: i64) -> Product {
        self.db
            .products()
            .insert(&NewProduct {
                name: name.to_string(),
                price_cents,
                stock,
                ..Default::default()
            })
            .await
            .unwrap()
    }
}

// =============================================================================
// Health & Auth
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = setup().await;

    let reply = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["database"], "ok");
}

#[tokio::test]
async fn test_login_failures_explain_themselves() {
    let app = setup().await;

    let reply = app
        .send(Method::POST, "/Libreria/login", None, Some(json!({ "email": ADMIN_EMAIL })))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["message"], "Email and password are required.");

    let reply = app
        .send(
            Method::POST,
            "/Libreria/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "x" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["message"], "This email is not registered.");

    let reply = app
        .send(
            Method::POST,
            "/Libreria/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": "wrong" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["message"], "The password is incorrect.");
}

#[tokio::test]
async fn test_missing_and_bad_tokens() {
    let app = setup().await;

    let reply = app.send(Method::GET, "/Libreria/carrito", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["message"], "Authentication credentials were not provided.");

    let reply = app.send(Method::GET, "/Libreria/carrito", Some("not-a-jwt"), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["message"], "Invalid or expired token.");
}

#[tokio::test]
async fn test_registration_ignores_requested_role() {
    let app = setup().await;
    let admin_role = app.db.roles().get_by_name(ADMIN_ROLE).await.unwrap().unwrap();

    let reply = app
        .send(
            Method::POST,
            "/Libreria/usuarios/crear-cliente",
            None,
            Some(json!({
                "email": "sneaky@example.com",
                "full_name": "Sneaky",
                "password": "pw",
                "role_id": admin_role.id,
            })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json()["role"], CUSTOMER_ROLE);
}

// =============================================================================
// Catalog & Permissions
// =============================================================================

#[tokio::test]
async fn test_product_reads_are_public_and_writes_need_permission() {
    let app = setup().await;
    app.product("Rayuela", 2_190, 12).await;

    let reply = app.send(Method::GET, "/Libreria/productos?buscar=rayu", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let products = reply.json();
    assert_eq!(products.as_array().unwrap().len(), 1);
    assert_eq!(products[0]["current_price_cents"], 2_190);
    assert_eq!(products[0]["has_offer"], false);

    let customer = app.customer_token("ana@example.com").await;
    let new_product = json!({ "name": "Ficciones", "price_cents": 1_890, "stock": 3 });

    let reply = app
        .send(Method::POST, "/Libreria/productos", Some(&customer), Some(new_product.clone()))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let admin = app.admin_token().await;
    let reply = app
        .send(Method::POST, "/Libreria/productos", Some(&admin), Some(new_product))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_catalog_duplicate_names_are_rejected() {
    let app = setup().await;
    let admin = app.admin_token().await;

    let reply = app
        .send(Method::POST, "/Libreria/generos", Some(&admin), Some(json!({ "nombre": "Poesía" })))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let id = reply.json()["id"].as_str().unwrap().to_string();

    let reply = app
        .send(Method::POST, "/Libreria/generos", Some(&admin), Some(json!({ "nombre": "poesía" })))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app.send(Method::GET, &format!("/Libreria/generos/{id}"), None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["name"], "Poesía");
}

// =============================================================================
// Carts & Orders
// =============================================================================

#[tokio::test]
async fn test_checkout_applies_top_tier() {
    let app = setup().await;
    let book = app.product("Enciclopedia", 35_000, 10).await;
    let customer = app.customer_token("ana@example.com").await;

    let reply = app
        .send(
            Method::POST,
            "/Libreria/detalle-carrito",
            Some(&customer),
            Some(json!({ "producto": book.id, "cantidad": 2 })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    assert_eq!(reply.json()["subtotal_cents"], 70_000);

    let cart = app.send(Method::GET, "/Libreria/carrito/activo", Some(&customer), None).await;
    let cart_id = cart.json()["id"].as_str().unwrap().to_string();

    let reply = app
        .send(
            Method::POST,
            &format!("/Libreria/carrito/{cart_id}/convertir-a-pedido"),
            Some(&customer),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    let order = reply.json();
    assert_eq!(order["subtotal_cents"], 70_000);
    assert_eq!(order["discount_pct"], 25);
    assert_eq!(order["total_cents"], 52_500);

    let stock = app.db.products().get_by_id(&book.id).await.unwrap().unwrap().stock;
    assert_eq!(stock, 8);

    // The converted cart cannot be checked out twice
    let reply = app
        .send(
            Method::POST,
            &format!("/Libreria/carrito/{cart_id}/convertir-a-pedido"),
            Some(&customer),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let mine = app.send(Method::GET, "/Libreria/pedidos/mis-pedidos", Some(&customer), None).await;
    assert_eq!(mine.json().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_carts_are_private() {
    let app = setup().await;
    let book = app.product("Dune", 2_990, 5).await;
    let ana = app.customer_token("ana@example.com").await;
    let bruno = app.customer_token("bruno@example.com").await;

    app.send(
        Method::POST,
        "/Libreria/detalle-carrito",
        Some(&ana),
        Some(json!({ "product_id": book.id })),
    )
    .await;
    let cart = app.send(Method::GET, "/Libreria/carrito/activo", Some(&ana), None).await;
    let cart_id = cart.json()["id"].as_str().unwrap().to_string();

    let reply = app
        .send(Method::GET, &format!("/Libreria/carrito/{cart_id}"), Some(&bruno), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .send(Method::GET, "/Libreria/carrito/does-not-exist", Some(&bruno), None)
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_adding_more_than_stock_fails() {
    let app = setup().await;
    let book = app.product("Cosmos", 2_790, 1).await;
    let customer = app.customer_token("ana@example.com").await;

    let reply = app
        .send(
            Method::POST,
            "/Libreria/detalle-carrito",
            Some(&customer),
            Some(json!({ "product_id": book.id, "quantity": 2 })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "insufficient_stock");
}

#[tokio::test]
async fn test_rating_must_be_between_one_and_five() {
    let app = setup().await;
    let book = app.product("El Aleph", 1_790, 4).await;
    let customer = app.customer_token("ana@example.com").await;

    let reply = app
        .send(
            Method::POST,
            "/Libreria/pedidos",
            Some(&customer),
            Some(json!({ "items": [{ "product_id": book.id, "quantity": 1 }] })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    let order_id = reply.json()["id"].as_str().unwrap().to_string();

    let uri = format!("/Libreria/pedidos/{order_id}/calificar");
    let reply = app
        .send(Method::POST, &uri, Some(&customer), Some(json!({ "calificacion": 6 })))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .send(Method::POST, &uri, Some(&customer), Some(json!({ "calificacion": 5 })))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["rating"], 5);
}

// =============================================================================
// Reports
// =============================================================================

#[tokio::test]
async fn test_reports_need_permission_and_valid_ranges() {
    let app = setup().await;
    let customer = app.customer_token("ana@example.com").await;
    let admin = app.admin_token().await;

    let reply = app
        .send(Method::GET, "/Libreria/reportes/resumen-general", Some(&customer), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .send(
            Method::GET,
            "/Libreria/reportes/resumen-general?fecha_inicio=2024-02-01&fecha_fin=2024-01-01",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .send(Method::GET, "/Libreria/reportes/reporte-rapido?periodo=pronto", Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .send(Method::GET, "/Libreria/reportes/productos-mas-vendidos?limite=500", Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .send(Method::GET, "/Libreria/reportes/dashboard", Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_sales_show_up_in_reports_and_csv() {
    let app = setup().await;
    let book = app.product("Ficciones", 1_890, 30).await;
    let customer = app.customer_token("ana@example.com").await;
    let admin = app.admin_token().await;

    app.send(
        Method::POST,
        "/Libreria/pedidos",
        Some(&customer),
        Some(json!({ "items": [{ "product_id": book.id, "quantity": 3 }] })),
    )
    .await;

    let reply = app
        .send(Method::GET, "/Libreria/reportes/productos-mas-vendidos", Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let products = &reply.json()["products"];
    assert_eq!(products[0]["product_name"], "Ficciones");
    assert_eq!(products[0]["units_sold"], 3);

    let reply = app
        .send(Method::GET, "/Libreria/reportes/exportar-productos-csv", Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    assert_eq!(
        reply.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"productos_mas_vendidos.csv\""
    );
    assert_eq!(reply.headers[header::ACCESS_CONTROL_EXPOSE_HEADERS], "Content-Disposition");
    assert!(reply.text().contains("Ficciones,,3,1,56.70"));

    let reply = app
        .send(
            Method::GET,
            "/Libreria/reportes/exportar-ventas-csv?agrupar_por=mes",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(
        reply.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"ventas_por_month.csv\""
    );
}

#[tokio::test]
async fn test_comparison_between_two_explicit_periods() {
    let app = setup().await;
    let book = app.product("Ficciones", 1_890, 30).await;
    let customer = app.customer_token("ana@example.com").await;
    let admin = app.admin_token().await;

    app.send(
        Method::POST,
        "/Libreria/pedidos",
        Some(&customer),
        Some(json!({ "items": [{ "product_id": book.id, "quantity": 3 }] })),
    )
    .await;

    let today = Utc::now().date_naive();
    let uri = format!(
        "/Libreria/reportes/comparativa-periodos?fecha_inicio_1={}&fecha_fin_1={}\
         &fecha_inicio_2=2020-01-01&fecha_fin_2=2020-02-01",
        today - Duration::days(1),
        today + Duration::days(1),
    );
    let reply = app.send(Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let body = reply.json();
    assert_eq!(body["order_count"]["current"], 1.0);
    assert_eq!(body["order_count"]["previous"], 0.0);
    assert!(body["order_count"]["percent_change"].is_null());
    assert_eq!(body["revenue_cents"]["difference"], 5_670.0);
    assert_eq!(body["previous_range"]["start"], "2020-01-01T00:00:00Z");

    let reply = app
        .send(
            Method::GET,
            "/Libreria/reportes/comparativa-periodos?fecha_inicio_1=2024-01-01&fecha_fin_1=2024-02-01\
             &fecha_inicio_2=2023-02-01&fecha_fin_2=2023-01-01",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.json()["message"].as_str().unwrap().contains("fecha_inicio_2"));

    let reply = app
        .send(Method::GET, "/Libreria/reportes/comparativa-periodos", Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_purchase_combinations() {
    let app = setup().await;
    let a = app.product("Rayuela", 2_190, 10).await;
    let b = app.product("Ficciones", 1_890, 10).await;
    let customer = app.customer_token("ana@example.com").await;
    let admin = app.admin_token().await;

    app.send(
        Method::POST,
        "/Libreria/pedidos",
        Some(&customer),
        Some(json!({ "items": [
            { "product_id": a.id, "quantity": 1 },
            { "product_id": b.id, "quantity": 1 },
        ] })),
    )
    .await;

    let reply = app
        .send(Method::GET, "/Libreria/pedidos/combinaciones-ml", Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json().as_array().unwrap().len(), 2);

    let reply = app.send(Method::GET, "/Libreria/ml-csv", Some(&admin), None).await;
    assert_eq!(
        reply.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"ml_combinations.csv\""
    );
    assert!(reply.text().starts_with("\"input\",\"target\""));

    let reply = app
        .send(Method::GET, "/Libreria/pedidos/combinaciones-ml?format=xml", Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Recommendations
// =============================================================================

async fn cart_with(app: &TestApp, token: &str, product: &Product) -> String {
    app.send(
        Method::POST,
        "/Libreria/detalle-carrito",
        Some(token),
        Some(json!({ "product_id": product.id })),
    )
    .await;
    let cart = app.send(Method::GET, "/Libreria/carrito/activo", Some(token), None).await;
    cart.json()["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_recommendations_unavailable() {
    let app = setup().await;
    let book = app.product("Dune", 2_990, 5).await;
    let customer = app.customer_token("ana@example.com").await;
    let cart_id = cart_with(&app, &customer, &book).await;

    let reply = app
        .send(
            Method::GET,
            &format!("/Libreria/carrito/{cart_id}/recomendaciones"),
            Some(&customer),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_recommendations_from_service() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Stub service: suggests whatever id it was configured with below
    let (tx, rx) = tokio::sync::oneshot::channel::<String>();
    tokio::spawn(async move {
        let suggested = rx.await.unwrap();
        let stub = Router::new().route(
            "/recommend",
            post(move |Json(body): Json<Value>| async move {
                assert!(body["input"].is_array());
                Json(json!({ "suggested": [suggested, "unknown-id"] }))
            }),
        );
        axum::serve(listener, stub).await.unwrap();
    });

    let app = setup_with(&format!("http://{addr}/recommend")).await;
    let dune = app.product("Dune", 2_990, 5).await;
    let hobbit = app.product("The Hobbit", 1_990, 5).await;
    tx.send(hobbit.id.clone()).unwrap();

    let customer = app.customer_token("ana@example.com").await;
    let cart_id = cart_with(&app, &customer, &dune).await;

    let reply = app
        .send(
            Method::GET,
            &format!("/Libreria/carrito/{cart_id}/recomendaciones"),
            Some(&customer),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());

    let body = reply.json();
    assert_eq!(body["cart_products"], json!([dune.id]));
    let recommendations = body["recommendations"].as_array().unwrap();
    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0]["name"], "The Hobbit");
}
