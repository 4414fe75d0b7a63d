//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{Duration, Utc};
use checkout::InMemoryPaymentGateway;
use domain::InMemoryStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

use api::AppState;
use api::auth::TokenSigner;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const ADMIN_EMAIL: &str = "admin@shop.test";
const ADMIN_PASSWORD: &str = "admin-password";
const PASSWORD: &str = "hunter2hunter2";

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    router: axum::Router,
    state: Arc<AppState<InMemoryStore>>,
    admin_token: String,
}

impl TestApp {
    async fn new() -> Self {
        let tokens = TokenSigner::new(b"integration-test-key-integration!", 3600).unwrap();
        let state = Arc::new(AppState::new(
            InMemoryStore::new(),
            InMemoryPaymentGateway::new(),
            tokens,
        ));
        state
            .identity
            .ensure_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .unwrap();
        let router = api::create_app(state.clone(), get_metrics_handle());

        let mut app = Self {
            router,
            state,
            admin_token: String::new(),
        };
        app.admin_token = app.login("/auth/login", ADMIN_EMAIL, ADMIN_PASSWORD).await;
        app
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn login(&self, path: &str, email: &str, password: &str) -> String {
        let (status, body) = self
            .send("POST", path, None, Some(json!({ "email": email, "password": password })))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Registers a customer with one address and returns (id, token).
    async fn customer(&self, email: &str) -> (String, String) {
        let (status, user) = self
            .send(
                "POST",
                "/auth/register",
                None,
                Some(json!({
                    "email": email,
                    "password": PASSWORD,
                    "first_name": "Casey",
                    "last_name": "Buyer"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{user}");
        let id = user["id"].as_str().unwrap().to_string();
        let token = self.login("/auth/login", email, PASSWORD).await;

        let (status, _) = self
            .send(
                "POST",
                &format!("/users/{id}/addresses"),
                Some(&token),
                Some(json!({
                    "street": "1 Main St",
                    "city": "Springfield",
                    "state": "IL",
                    "postal_code": "62701",
                    "country": "US"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        (id, token)
    }

    async fn product(&self, name: &str, price_cents: i64, stock: i64) -> String {
        let (status, product) = self
            .send(
                "POST",
                "/products",
                Some(&self.admin_token),
                Some(json!({
                    "name": name,
                    "price_cents": price_cents,
                    "initial_stock": stock
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{product}");
        product["id"].as_str().unwrap().to_string()
    }

    async fn shipping_method(&self, price_cents: i64) -> String {
        let (status, method) = self
            .send(
                "POST",
                "/shipping-methods",
                Some(&self.admin_token),
                Some(json!({ "name": "Ground", "price_cents": price_cents, "estimated_days": 5 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{method}");
        method["id"].as_str().unwrap().to_string()
    }
}

fn assert_problem(body: &Value, status: StatusCode) {
    assert_eq!(body["type"], "about:blank");
    assert_eq!(body["status"], status.as_u16());
    assert!(body["title"].is_string());
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("casey@example.com").await;

    let (status, me) = app.send("GET", "/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "casey@example.com");
    assert_eq!(me["roles"], json!(["customer"]));
    assert!(me.get("password_hash").is_none());
    assert_eq!(me["addresses"][0]["is_default"], true);
}

#[tokio::test]
async fn test_login_response_shape() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["access_token"].as_str().unwrap().contains('.'));
    assert!(body["expires_at"].is_string());
    assert_eq!(body["user"]["email"], ADMIN_EMAIL);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = TestApp::new().await;
    app.customer("dup@example.com").await;

    let (status, body) = app
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "email": "DUP@example.com",
                "password": PASSWORD,
                "first_name": "Again",
                "last_name": "Again"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_problem(&body, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_invalid_registration_lists_field_errors() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "email": "not-an-email",
                "password": "short",
                "first_name": "A",
                "last_name": "B"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_problem(&body, StatusCode::BAD_REQUEST);
    assert_eq!(body["title"], "Validation failed");
    assert!(body["errors"]["email"].is_array());
    assert!(body["errors"]["password"].is_array());
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_problem(&body, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_customer_cannot_use_carrier_login() {
    let app = TestApp::new().await;
    app.customer("notacarrier@example.com").await;

    let (status, _) = app
        .send(
            "POST",
            "/auth/carriers/login",
            None,
            Some(json!({ "email": "notacarrier@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_or_bad_tokens_are_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app.send("GET", "/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_problem(&body, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send("GET", "/users/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut tampered = app.admin_token.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == '0' { '1' } else { '0' });
    let (status, _) = app.send("GET", "/users/me", Some(&tampered), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin = app
        .state
        .identity
        .authenticate(ADMIN_EMAIL, ADMIN_PASSWORD, None)
        .await
        .unwrap();
    let expired = app
        .state
        .tokens
        .issue(admin.id, Utc::now() - Duration::hours(2));
    let (status, _) = app.send("GET", "/users/me", Some(&expired.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deactivated_user_token_stops_working() {
    let app = TestApp::new().await;
    let (id, token) = app.customer("leaving@example.com").await;

    let (status, _) = app
        .send("DELETE", &format!("/users/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send("GET", "/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_users_only_see_themselves() {
    let app = TestApp::new().await;
    let (alice_id, alice) = app.customer("alice@example.com").await;
    let (bob_id, _) = app.customer("bob@example.com").await;

    let (status, _) = app
        .send("GET", &format!("/users/{alice_id}"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send("GET", &format!("/users/{bob_id}"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_problem(&body, StatusCode::FORBIDDEN);

    let (status, _) = app.send("GET", "/users", Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, page) = app
        .send("GET", "/users?per_page=2", Some(&app.admin_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["per_page"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_replaces_roles() {
    let app = TestApp::new().await;
    let (id, _) = app.customer("promoted@example.com").await;

    let (status, user) = app
        .send(
            "PUT",
            &format!("/users/{id}/roles"),
            Some(&app.admin_token),
            Some(json!({ "roles": ["customer", "carrier"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["roles"], json!(["customer", "carrier"]));
}

#[tokio::test]
async fn test_malformed_input_is_a_bad_request() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send("GET", "/products/not-a-uuid", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_problem(&body, StatusCode::BAD_REQUEST);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{ not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/problem+json"
    );
}

#[tokio::test]
async fn test_catalog_writes_require_admin() {
    let app = TestApp::new().await;
    let (_, customer) = app.customer("shopper@example.com").await;

    let category = json!({ "name": "Tools" });
    let (status, _) = app
        .send("POST", "/categories", Some(&customer), Some(category.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("POST", "/categories", None, Some(category.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, created) = app
        .send("POST", "/categories", Some(&app.admin_token), Some(category.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .send("POST", "/categories", Some(&app.admin_token), Some(json!({ "name": "tools" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, list) = app.send("GET", "/categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);
    assert_eq!(list["items"][0]["id"], created["id"]);
}

#[tokio::test]
async fn test_products_filter_by_category() {
    let app = TestApp::new().await;
    let (_, category) = app
        .send("POST", "/categories", Some(&app.admin_token), Some(json!({ "name": "Garden" })))
        .await;
    let category_id = category["id"].as_str().unwrap();

    let (status, _) = app
        .send(
            "POST",
            "/products",
            Some(&app.admin_token),
            Some(json!({
                "name": "Rake",
                "price_cents": 1500,
                "category_ids": [category_id],
                "initial_stock": 3
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    app.product("Hammer", 2000, 3).await;

    let (_, all) = app.send("GET", "/products", None, None).await;
    assert_eq!(all["total"], 2);

    let (_, filtered) = app
        .send("GET", &format!("/products?category_id={category_id}"), None, None)
        .await;
    assert_eq!(filtered["total"], 1);
    assert_eq!(filtered["items"][0]["name"], "Rake");
    assert_eq!(filtered["items"][0]["price_cents"], 1500);
    assert_eq!(filtered["items"][0]["stock"]["available"], 3);
}

#[tokio::test]
async fn test_inactive_products_are_hidden_from_the_public() {
    let app = TestApp::new().await;
    let id = app.product("Retired", 1000, 0).await;

    let (status, _) = app
        .send("DELETE", &format!("/products/{id}"), Some(&app.admin_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send("GET", &format!("/products/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, product) = app
        .send("GET", &format!("/products/{id}"), Some(&app.admin_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["is_active"], false);

    let (_, public) = app
        .send("GET", "/products?include_inactive=true", None, None)
        .await;
    assert_eq!(public["total"], 0);

    let (_, admin) = app
        .send("GET", "/products?include_inactive=true", Some(&app.admin_token), None)
        .await;
    assert_eq!(admin["total"], 1);
}

#[tokio::test]
async fn test_inventory_patch() {
    let app = TestApp::new().await;
    let id = app.product("Bolt", 50, 10).await;
    let uri = format!("/products/{id}/inventory");

    let (status, stock) = app
        .send("PATCH", &uri, Some(&app.admin_token), Some(json!({ "delta": 5 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stock["on_hand"], 15);

    let (status, stock) = app
        .send("PATCH", &uri, Some(&app.admin_token), Some(json!({ "on_hand": 4 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stock["on_hand"], 4);

    let (status, _) = app
        .send("PATCH", &uri, Some(&app.admin_token), Some(json!({ "delta": -10 })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(
            "PATCH",
            &uri,
            Some(&app.admin_token),
            Some(json!({ "delta": 1, "on_hand": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_promotions_are_admin_only() {
    let app = TestApp::new().await;
    let (_, customer) = app.customer("bargain@example.com").await;
    let now = Utc::now();
    let sale = json!({
        "name": "Spring",
        "percentage": 20,
        "starts_at": now - Duration::days(1),
        "ends_at": now + Duration::days(1)
    });

    let (status, _) = app.send("GET", "/sales", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app
        .send("POST", "/sales", Some(&app.admin_token), Some(sale))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["percentage"], 20);

    let backwards = json!({
        "code": "BACKWARDS",
        "percentage": 10,
        "starts_at": now + Duration::days(1),
        "ends_at": now - Duration::days(1)
    });
    let (status, body) = app
        .send("POST", "/coupons", Some(&app.admin_token), Some(backwards))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_problem(&body, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "POST",
            "/coupons",
            Some(&app.admin_token),
            Some(json!({ "code": "SAVE", "percentage": 150, "starts_at": now, "ends_at": now })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_and_fulfilment_flow() {
    let app = TestApp::new().await;
    let product_id = app.product("Widget", 2500, 10).await;
    let shipping_id = app.shipping_method(599).await;
    let now = Utc::now();
    let (status, _) = app
        .send(
            "POST",
            "/coupons",
            Some(&app.admin_token),
            Some(json!({
                "code": "SAVE10",
                "percentage": 10,
                "starts_at": now - Duration::days(1),
                "ends_at": now + Duration::days(1),
                "usage_limit": 5
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, customer) = app.customer("buyer@example.com").await;
    let request = json!({
        "items": [{ "product_id": product_id, "quantity": 2 }],
        "coupon_codes": ["save10"],
        "shipping_method_id": shipping_id,
        "payment_method": "card"
    });

    // Quote: 2 x 2500 - 10% + 599
    let (status, quote) = app
        .send("POST", "/orders/quote", Some(&customer), Some(request.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{quote}");
    assert_eq!(quote["pricing"]["subtotal_cents"], 5000);
    assert_eq!(quote["pricing"]["discount_total_cents"], 500);
    assert_eq!(quote["pricing"]["total_cents"], 5099);

    let (status, order) = app
        .send("POST", "/orders", Some(&customer), Some(request))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["status"], "placed");
    assert_eq!(order["pricing"]["total_cents"], 5099);
    assert_eq!(order["payment"]["status"], "authorized");
    assert_eq!(order["coupon_codes"], json!(["SAVE10"]));
    let order_id = order["id"].as_str().unwrap().to_string();

    let (_, product) = app
        .send("GET", &format!("/products/{product_id}"), None, None)
        .await;
    assert_eq!(product["stock"]["reserved"], 2);

    // Another customer cannot see it
    let (_, stranger) = app.customer("stranger@example.com").await;
    let (status, _) = app
        .send("GET", &format!("/orders/{order_id}"), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Carrier signs up and gets the shipment
    let (status, carrier) = app
        .send(
            "POST",
            "/auth/carriers/register",
            None,
            Some(json!({
                "email": "driver@example.com",
                "password": PASSWORD,
                "first_name": "Dana",
                "last_name": "Driver"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let carrier_id = carrier["id"].as_str().unwrap().to_string();
    let carrier_token = app
        .login("/auth/carriers/login", "driver@example.com", PASSWORD)
        .await;

    let ship = json!({ "carrier_id": carrier_id });
    let (status, _) = app
        .send(
            "POST",
            &format!("/orders/{order_id}/ship"),
            Some(&customer),
            Some(ship.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, shipped) = app
        .send(
            "POST",
            &format!("/orders/{order_id}/ship"),
            Some(&app.admin_token),
            Some(ship),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{shipped}");
    assert_eq!(shipped["status"], "shipped");
    assert_eq!(shipped["payment"]["status"], "captured");
    assert!(shipped["shipment"]["tracking_number"].is_string());

    let (_, product) = app
        .send("GET", &format!("/products/{product_id}"), None, None)
        .await;
    assert_eq!(product["stock"]["on_hand"], 8);
    assert_eq!(product["stock"]["reserved"], 0);

    let (status, shipments) = app
        .send("GET", "/shipments", Some(&carrier_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shipments["total"], 1);

    let (status, _) = app.send("GET", "/shipments", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, delivered) = app
        .send(
            "POST",
            &format!("/orders/{order_id}/deliver"),
            Some(&carrier_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["status"], "delivered");

    // Delivered orders cannot be cancelled
    let (status, body) = app
        .send(
            "POST",
            &format!("/orders/{order_id}/cancel"),
            Some(&customer),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_problem(&body, StatusCode::CONFLICT);

    let (_, mine) = app.send("GET", "/orders", Some(&customer), None).await;
    assert_eq!(mine["total"], 1);
    let (_, theirs) = app.send("GET", "/orders", Some(&stranger), None).await;
    assert_eq!(theirs["total"], 0);
}

#[tokio::test]
async fn test_cancel_releases_stock() {
    let app = TestApp::new().await;
    let product_id = app.product("Gizmo", 1000, 3).await;
    let shipping_id = app.shipping_method(0).await;
    let (_, customer) = app.customer("fickle@example.com").await;

    let (status, order) = app
        .send(
            "POST",
            "/orders",
            Some(&customer),
            Some(json!({
                "items": [{ "product_id": product_id, "quantity": 3 }],
                "shipping_method_id": shipping_id,
                "payment_method": "cash_on_delivery"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    let order_id = order["id"].as_str().unwrap();

    let (status, cancelled) = app
        .send(
            "POST",
            &format!("/orders/{order_id}/cancel"),
            Some(&customer),
            Some(json!({ "reason": "changed my mind" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["payment"]["status"], "voided");

    let (_, product) = app
        .send("GET", &format!("/products/{product_id}"), None, None)
        .await;
    assert_eq!(product["stock"]["reserved"], 0);
    assert_eq!(product["stock"]["available"], 3);
}

#[tokio::test]
async fn test_insufficient_stock_conflicts() {
    let app = TestApp::new().await;
    let product_id = app.product("Rare", 9900, 1).await;
    let shipping_id = app.shipping_method(0).await;
    let (_, customer) = app.customer("greedy@example.com").await;

    let (status, body) = app
        .send(
            "POST",
            "/orders",
            Some(&customer),
            Some(json!({
                "items": [{ "product_id": product_id, "quantity": 2 }],
                "shipping_method_id": shipping_id,
                "payment_method": "card"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_problem(&body, StatusCode::CONFLICT);

    let (_, orders) = app.send("GET", "/orders", Some(&customer), None).await;
    assert_eq!(orders["total"], 0);
}

#[tokio::test]
async fn test_oversized_amounts_are_bad_requests() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            "POST",
            "/products",
            Some(&app.admin_token),
            Some(json!({ "name": "Yacht", "price_cents": 4_000_000_000_i64, "initial_stock": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["price_cents"].is_array());

    let product_id = app.product("Bolt", 100_000_000, 1).await;
    let shipping_id = app.shipping_method(500).await;
    let (_, customer) = app.customer("bulk@example.com").await;

    let (status, body) = app
        .send(
            "POST",
            "/orders/quote",
            Some(&customer),
            Some(json!({
                "items": [{ "product_id": product_id, "quantity": 4_000_000_000_u32 }],
                "shipping_method_id": shipping_id
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_problem(&body, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["items"].is_array());
}
