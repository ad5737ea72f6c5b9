//! End-to-end tests against the router with the in-memory store.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use dahi_marketplace::api::{router, AppState};
use dahi_marketplace::config::Config;
use dahi_marketplace::domain::aggregates::User;
use dahi_marketplace::domain::events::MarketplaceEvent;
use dahi_marketplace::domain::value_objects::{OrderNumber, Role};
use dahi_marketplace::notify::Notifier;
use dahi_marketplace::store::{MemoryStore, Store};
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tower::ServiceExt;

/// Records every dispatched event.
struct Recorder(UnboundedSender<MarketplaceEvent>);

#[async_trait::async_trait]
impl Notifier for Recorder {
    async fn notify(&self, event: &MarketplaceEvent) -> dahi_marketplace::Result<()> {
        let _ = self.0.send(event.clone());
        Ok(())
    }
}

struct TestApp {
    app: Router,
    state: AppState,
    store: Arc<dyn Store>,
    events: UnboundedReceiver<MarketplaceEvent>,
}

impl TestApp {
    fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let (tx, events) = mpsc::unbounded_channel();
        let state = AppState::new(store.clone(), Arc::new(Recorder(tx)), &Config::local("integration-secret"));
        Self { app: router(state.clone()), state, store, events }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    /// Register through the API and return the bearer token.
    async fn register(&self, email: &str, role: &str) -> String {
        let body = json!({"name": "Test User", "email": email, "password": "secret123", "role": role});
        let (status, json) = self.send(Method::POST, "/api/auth/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["data"]["token"].as_str().unwrap().to_string()
    }

    /// Staff accounts cannot self-register; insert one directly.
    async fn staff(&self, role: Role) -> String {
        let user = User::register("Staff", format!("{}@staff.example.com", role.as_str().replace(' ', "-")), None, role);
        self.store.insert_user(&user).await.unwrap();
        self.state.tokens.issue(user.id, role).unwrap()
    }

    async fn product(&self, token: &str, price: u32, stock: u32) -> String {
        let body = json!({
            "name": "Jebena",
            "description": "Clay coffee pot",
            "price": price,
            "category": "Home & Garden",
            "stock": stock,
            "images": ["https://img.example/jebena.jpg"],
            "tags": ["coffee"]
        });
        let (status, json) = self.send(Method::POST, "/api/products", Some(token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["data"]["id"].as_str().unwrap().to_string()
    }

    async fn product_json(&self, id: &str) -> Value {
        let (status, json) = self.send(Method::GET, &format!("/api/products/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        json["data"].clone()
    }

    async fn order(&self, token: &str, product_id: &str, quantity: u32) -> (StatusCode, Value) {
        let body = json!({
            "shippingAddress": {"street": "Bole Road", "city": "Addis Ababa", "phone": "+251911000000"},
            "paymentMethod": "cash_on_delivery",
            "items": [{"productId": product_id, "quantity": quantity}]
        });
        self.send(Method::POST, "/api/orders", Some(token), Some(body)).await
    }
}

#[tokio::test]
async fn health_check() {
    let app = TestApp::new();
    let (status, json) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn checkout_from_cart() {
    let mut app = TestApp::new();
    let seller = app.register("seller@example.com", "seller").await;
    let buyer = app.register("buyer@example.com", "buyer").await;
    let product = app.product(&seller, 100, 5).await;

    let (status, _) = app.send(Method::POST, "/api/cart", Some(&buyer), Some(json!({"productId": product, "quantity": 2}))).await;
    assert_eq!(status, StatusCode::OK);

    let body = json!({
        "shippingAddress": {"street": "Bole Road", "city": "Addis Ababa", "phone": "+251911000000"},
        "paymentMethod": "cash_on_delivery",
        "shippingCost": 50,
        "useCart": true
    });
    let (status, json) = app.send(Method::POST, "/api/orders", Some(&buyer), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    let order = &json["data"];
    assert_eq!(order["totalAmount"].as_f64(), Some(250.0));
    assert_eq!(order["orderStatus"], "pending");
    assert_eq!(order["paymentStatus"], "pending");
    assert_eq!(order["shippingAddress"]["country"], "Ethiopia");
    assert_eq!(order["shippingAddress"]["state"], "N/A");
    let number = order["orderNumber"].as_str().unwrap();
    assert!(OrderNumber::is_well_formed(number));
    assert!(number.starts_with("HOM"));

    assert_eq!(app.product_json(&product).await["stock"], 3);
    let (_, cart) = app.send(Method::GET, "/api/cart", Some(&buyer), None).await;
    assert_eq!(cart["data"]["items"].as_array().unwrap().len(), 0);

    assert!(matches!(app.events.recv().await, Some(MarketplaceEvent::OrderPlaced { .. })));
    assert!(matches!(app.events.recv().await, Some(MarketplaceEvent::SellerOrderReceived { .. })));
}

#[tokio::test]
async fn checkout_beyond_stock_is_rejected() {
    let app = TestApp::new();
    let seller = app.register("seller@example.com", "seller").await;
    let buyer = app.register("buyer@example.com", "buyer").await;
    let product = app.product(&seller, 100, 1).await;

    let (status, json) = app.order(&buyer, &product, 2).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().unwrap().contains("Insufficient stock"));
    assert_eq!(app.product_json(&product).await["stock"], 1);
    let (_, mine) = app.send(Method::GET, "/api/orders/my-orders", Some(&buyer), None).await;
    assert_eq!(mine["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn sellers_only_update_their_own_orders() {
    let app = TestApp::new();
    let seller_a = app.register("a@example.com", "seller").await;
    let seller_b = app.register("b@example.com", "product provider").await;
    let buyer = app.register("buyer@example.com", "buyer").await;
    let admin = app.staff(Role::Admin).await;
    let product = app.product(&seller_b, 100, 5).await;
    let (_, json) = app.order(&buyer, &product, 1).await;
    let order_id = json["data"]["id"].as_str().unwrap().to_string();
    let status_uri = format!("/api/orders/{order_id}/status");

    let (status, json) = app.send(Method::PUT, &status_uri, Some(&seller_a), Some(json!({"orderStatus": "processing"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["success"], false);

    let (status, _) = app.send(Method::PUT, &status_uri, Some(&seller_b), Some(json!({"orderStatus": "delivered"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, json) = app.send(Method::PUT, &status_uri, Some(&seller_b), Some(json!({"orderStatus": "processing", "trackingNumber": "ET123"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["trackingNumber"], "ET123");

    let (status, _) = app.send(Method::PUT, &status_uri, Some(&seller_b), Some(json!({"paymentStatus": "paid"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, json) = app.send(Method::PUT, &status_uri, Some(&admin), Some(json!({"orderStatus": "pending", "paymentStatus": "paid"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["orderStatus"], "pending");
    assert_eq!(json["data"]["paymentStatus"], "paid");

    let (_, seller_orders) = app.send(Method::GET, "/api/orders/seller-orders", Some(&seller_b), None).await;
    assert_eq!(seller_orders["data"].as_array().unwrap().len(), 1);
    let (status, _) = app.send(Method::GET, &format!("/api/orders/{order_id}"), Some(&seller_a), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn promotion_discounts_products() {
    let app = TestApp::new();
    let seller = app.register("seller@example.com", "seller").await;
    let marketing = app.staff(Role::MarketingTeam).await;
    let product = app.product(&seller, 1000, 5).await;
    let body = json!({
        "name": "Timket Deals",
        "type": "holiday",
        "discountType": "percentage",
        "discountValue": 20,
        "startDate": (Utc::now() - Duration::hours(1)).to_rfc3339(),
        "endDate": (Utc::now() + Duration::days(3)).to_rfc3339(),
        "products": [product]
    });

    let (status, _) = app.send(Method::POST, "/api/promotions", Some(&seller), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, json) = app.send(Method::POST, "/api/promotions", Some(&marketing), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    let promotion_id = json["data"]["id"].as_str().unwrap().to_string();

    let view = app.product_json(&product).await;
    assert_eq!(view["price"].as_f64(), Some(800.0));
    assert_eq!(view["originalPrice"].as_f64(), Some(1000.0));
    assert_eq!(view["onSale"], true);

    let (status, _) = app.send(Method::PATCH, &format!("/api/promotions/{promotion_id}/toggle"), Some(&marketing), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.product_json(&product).await["price"].as_f64(), Some(1000.0));

    let (status, _) = app.send(Method::DELETE, &format!("/api/promotions/{promotion_id}"), Some(&marketing), None).await;
    assert_eq!(status, StatusCode::OK);
    let view = app.product_json(&product).await;
    assert_eq!(view["onSale"], false);
    assert!(view["originalPrice"].is_null());
}

#[tokio::test]
async fn auth_failures_use_error_body() {
    let app = TestApp::new();
    let (status, json) = app.send(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    let (status, _) = app.send(Method::GET, "/api/auth/me", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = app.send(Method::POST, "/api/auth/register", None, Some(json!({"name": "X"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    let body = json!({"name": "Boss", "email": "boss@example.com", "password": "secret123", "role": "admin"});
    let (status, _) = app.send(Method::POST, "/api/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_and_profile() {
    let app = TestApp::new();
    app.register("selam@example.com", "individual").await;
    let (status, json) = app.send(Method::POST, "/api/auth/login", None, Some(json!({"email": "selam@example.com", "password": "secret123"}))).await;
    assert_eq!(status, StatusCode::OK);
    let token = json["data"]["token"].as_str().unwrap().to_string();
    assert!(json["data"]["user"].get("passwordHash").is_none());

    let (status, json) = app.send(Method::PUT, "/api/auth/profile", Some(&token), Some(json!({"companyName": "Selam Crafts"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["companyName"], "Selam Crafts");
    let (_, me) = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(me["data"]["role"], "individual");
}

#[tokio::test]
async fn catalog_listing_and_admin_views() {
    let app = TestApp::new();
    let seller = app.register("seller@example.com", "seller").await;
    let admin = app.staff(Role::SuperAdmin).await;
    let cheap = app.product(&seller, 50, 5).await;
    app.product(&seller, 500, 5).await;

    let (status, json) = app.send(Method::GET, "/api/products?maxPrice=100&sortBy=price&order=asc", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["pagination"]["total"], 1);
    assert_eq!(json["data"]["products"][0]["id"], cheap.as_str());
    let (status, _) = app.send(Method::GET, "/api/products?category=Spaceships", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(Method::PUT, &format!("/api/admin/products/{cheap}/status"), Some(&admin), Some(json!({"isActive": false}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::GET, &format!("/api/products/{cheap}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, stats) = app.send(Method::GET, "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["data"]["totalProducts"], 2);
    let (status, _) = app.send(Method::GET, "/api/admin/stats", Some(&seller), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, top) = app.send(Method::GET, "/api/admin/top-sellers", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(top["data"].as_array().unwrap().len(), 1);
    assert!(top["data"][0].get("score").is_none());
}

#[tokio::test]
async fn newsletter_subscriptions() {
    let app = TestApp::new();
    let body = json!({"email": "reader@example.com"});
    let (status, _) = app.send(Method::POST, "/api/subscriptions/subscribe", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.send(Method::POST, "/api/subscriptions/subscribe", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, json) = app.send(Method::POST, "/api/subscriptions/unsubscribe", None, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["isActive"], false);
}
